use super::channel::{byte_channel, ChannelReader, ChannelWriter};
use super::core::{StageResult, Transform};
use super::lines::LineScanner;
use crate::error::{PipeError, PipeResult};
use crate::logger::{LogLevel, LOGGER};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Name given to the worker feeding a stream built by `Stream::new`
pub const SOURCE_STAGE: &str = "Source";

/// How long `finish` waits for workers whose output was never read to the end
pub const DETACH_GRACE: Duration = Duration::from_millis(250);

/// Buffered read end of a stage's output channel
type StageReader = BufReader<ChannelReader>;

/// What a stage worker hands back when it is done
struct StageOutcome {
    result: PipeResult<()>,
    duration: Duration,
    bytes_written: u64,
}

/// A running worker and the name it logs under
struct StageWorker {
    name: String,
    started: Instant,
    /// Receives exactly one outcome, or disconnects if the worker panicked
    outcome: Receiver<StageOutcome>,
    /// Set once the worker's output has been read to end of stream
    output_drained: Arc<AtomicBool>,
}

/// Output of every worker once a stream has been finished
#[derive(Debug)]
pub struct StageReport {
    /// One entry per stage, source first
    pub stage_results: Vec<StageResult>,

    /// Root cause of the failure, if any stage failed
    pub error: Option<PipeError>,
}

impl StageReport {
    pub fn into_result(self) -> PipeResult<Vec<StageResult>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.stage_results),
        }
    }
}

/// The read end of the last stage of a pipeline
///
/// A `Stream` owns its buffered channel reader and a handle on every worker
/// upstream of it. Workers hold only their own upstream reader and downstream
/// writer. `pipe` moves the whole group into the new stream, so the final
/// stream is the single owner of the run.
///
/// All reads go through one buffer: `lines`, `Read`, `BufRead` and
/// `into_bytes` can be mixed freely and pick up exactly where the previous
/// call stopped.
///
/// Dropping a stream early drops its reader: the last worker's next write
/// fails with `BrokenPipe`, it exits and drops its own reader, and the failure
/// walks back to the source. The workers are detached in that case; call
/// [`Stream::finish`] to collect their results.
///
/// # Example
/// ```
/// use std::io::{BufRead, Write};
/// use streampipe_lib::pipeline::{transform_fn, Stream};
///
/// let stream = Stream::new("a\nb\n")
///     .unwrap()
///     .pipe(transform_fn("Double", |input: &mut dyn BufRead, output: &mut dyn Write| {
///         for line in input.lines() {
///             let line = line?;
///             writeln!(output, "{}{}", line, line)?;
///         }
///         Ok(())
///     }))
///     .unwrap();
///
/// assert_eq!(stream.into_bytes().unwrap(), b"aa\nbb\n");
/// ```
pub struct Stream {
    reader: StageReader,
    workers: Vec<StageWorker>,
    run_id: String,
}

impl Stream {
    /// Stream whose content is exactly `input`
    ///
    /// A producer worker writes the whole payload in one write, then closes.
    pub fn new(input: impl Into<Vec<u8>>) -> PipeResult<Self> {
        let payload = input.into();
        Self::from_producer(SOURCE_STAGE, move |output| {
            output.write_all(&payload)?;
            Ok(())
        })
    }

    /// Stream fed by an arbitrary producer running on its own worker
    ///
    /// The channel closes when `produce` returns, whatever the outcome.
    pub fn from_producer<F>(name: impl Into<String>, produce: F) -> PipeResult<Self>
    where
        F: FnOnce(&mut dyn Write) -> PipeResult<()> + Send + 'static,
    {
        let run_id = uuid::Uuid::new_v4().to_string();
        let (reader, worker) = spawn_stage(name.into(), &run_id, move |writer| produce(writer))?;
        Ok(Self {
            reader,
            workers: vec![worker],
            run_id,
        })
    }

    /// Stream that copies everything from `source` (stdin, a file, ...)
    pub fn from_reader<R>(name: impl Into<String>, mut source: R) -> PipeResult<Self>
    where
        R: Read + Send + 'static,
    {
        Self::from_producer(name, move |output| {
            io::copy(&mut source, output)?;
            Ok(())
        })
    }

    /// Attach `transform` as the next stage
    ///
    /// Spawns one worker and returns at once; the worker reads this stream's
    /// output and the returned stream carries what the transform writes.
    pub fn pipe<T: Transform>(self, transform: T) -> PipeResult<Self> {
        self.pipe_shared(Arc::new(transform))
    }

    /// Same as [`Stream::pipe`] for a transform shared between runs
    ///
    /// Bytes already buffered from this stream are handed to the transform
    /// first.
    pub fn pipe_shared(self, transform: Arc<dyn Transform>) -> PipeResult<Self> {
        let Stream {
            reader: upstream,
            mut workers,
            run_id,
        } = self;

        let name = transform.name().to_string();
        let (reader, worker) = spawn_stage(name, &run_id, move |writer| {
            let mut input = upstream;
            transform.apply(&mut input, writer)
        })?;
        workers.push(worker);

        Ok(Self {
            reader,
            workers,
            run_id,
        })
    }

    /// Id shared by every stage of this run
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Number of workers feeding this stream
    pub fn stage_count(&self) -> usize {
        self.workers.len()
    }

    /// Iterate over the lines of this stream as they arrive
    ///
    /// Dropping the iterator loses nothing; a later call continues with the
    /// next unread line.
    pub fn lines(
        &mut self,
        max_line_len: usize,
    ) -> LineScanner<&mut BufReader<ChannelReader>> {
        LineScanner::with_max_line_len(&mut self.reader, max_line_len)
    }

    /// Drain the stream into memory and finish it
    pub fn into_bytes(mut self) -> PipeResult<Vec<u8>> {
        let mut out = Vec::new();
        let read = self.reader.read_to_end(&mut out);
        let report = self.finish();
        read?;
        report.into_result()?;
        Ok(out)
    }

    /// Stop reading and collect every worker's outcome in pipeline order
    ///
    /// Anything left unread is abandoned, so upstream writers fail with
    /// `ConsumerGone` rather than block. A worker whose output was read to
    /// end of stream has already closed and is waited for. Any other worker
    /// may be parked on input that never arrives (an interactive stdin), so
    /// it gets until [`DETACH_GRACE`] has passed and is then left detached
    /// and reported as abandoned.
    ///
    /// The reported error is the first failure in pipeline order that is not
    /// just a consequence of a downstream consumer going away.
    pub fn finish(self) -> StageReport {
        let Stream {
            reader,
            workers,
            run_id,
        } = self;
        drop(reader);

        let deadline = Instant::now() + DETACH_GRACE;
        let mut stage_results = Vec::with_capacity(workers.len());
        let mut errors = Vec::new();

        for worker in workers {
            let received = if worker.output_drained.load(Ordering::Acquire) {
                worker
                    .outcome
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                worker.outcome.recv_deadline(deadline)
            };

            match received {
                Ok(outcome) => match outcome.result {
                    Ok(()) => stage_results.push(StageResult::success(
                        &worker.name,
                        outcome.duration,
                        outcome.bytes_written,
                    )),
                    Err(e) => {
                        let message = e.to_string();
                        let result = if matches!(e, PipeError::ConsumerGone { .. }) {
                            StageResult::abandoned(
                                &worker.name,
                                message,
                                outcome.duration,
                                outcome.bytes_written,
                            )
                        } else {
                            StageResult::failure(
                                &worker.name,
                                message,
                                outcome.duration,
                                outcome.bytes_written,
                            )
                        };
                        stage_results.push(result);
                        errors.push(e);
                    }
                },
                Err(RecvTimeoutError::Timeout) => {
                    LOGGER.log(
                        LogLevel::Warn,
                        &format!(
                            "Stage '{}' still blocked after its consumer left, detaching (run: {})",
                            worker.name, run_id
                        ),
                        "pipeline::stream",
                    );
                    let e = PipeError::ConsumerGone {
                        stage: worker.name.clone(),
                    };
                    stage_results.push(StageResult::abandoned(
                        &worker.name,
                        e.to_string(),
                        worker.started.elapsed(),
                        0,
                    ));
                    errors.push(e);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    LOGGER.log(
                        LogLevel::Error,
                        &format!("Stage '{}' panicked (run: {})", worker.name, run_id),
                        "pipeline::stream",
                    );
                    let e = PipeError::StagePanicked {
                        stage: worker.name.clone(),
                    };
                    stage_results.push(StageResult::failure(
                        &worker.name,
                        e.to_string(),
                        Duration::ZERO,
                        0,
                    ));
                    errors.push(e);
                }
            }
        }

        StageReport {
            stage_results,
            error: root_cause(errors),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl BufRead for Stream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

/// Pick the error that explains a failed run
///
/// `ConsumerGone` is what upstream stages see after something downstream
/// stopped reading, so it only wins when nothing else failed. Among those,
/// the stage nearest the consumer is reported.
fn root_cause(errors: Vec<PipeError>) -> Option<PipeError> {
    let mut gone = None;
    for e in errors {
        match e {
            PipeError::ConsumerGone { .. } => gone = Some(e),
            other => return Some(other),
        }
    }
    gone
}

/// Spawn a worker that runs `body` against a fresh channel
///
/// The writer is closed exactly once, right after `body` returns. If `body`
/// panics the writer is dropped while unwinding, which closes it too, and
/// the outcome sender goes with it.
fn spawn_stage<F>(name: String, run_id: &str, body: F) -> PipeResult<(StageReader, StageWorker)>
where
    F: FnOnce(&mut ChannelWriter) -> PipeResult<()> + Send + 'static,
{
    let (mut writer, reader) = byte_channel();
    let output_drained = reader.end_flag();
    let (outcome_tx, outcome) = bounded(1);
    let stage = name.clone();
    let run = run_id.to_string();
    let started = Instant::now();

    thread::Builder::new()
        .name(format!("stage-{}", name))
        .spawn(move || {
            LOGGER.log(
                LogLevel::Debug,
                &format!("Stage '{}' started (run: {})", stage, run),
                "pipeline::stream",
            );

            let start = Instant::now();
            let result = body(&mut writer).map_err(|e| e.in_stage(&stage));
            let bytes_written = writer.bytes_written();
            writer.close();
            let duration = start.elapsed();

            match &result {
                Ok(()) => LOGGER.log(
                    LogLevel::Debug,
                    &format!(
                        "Stage '{}' closed after {} bytes in {:.3}s (run: {})",
                        stage,
                        bytes_written,
                        duration.as_secs_f64(),
                        run
                    ),
                    "pipeline::stream",
                ),
                Err(e) => LOGGER.log(
                    LogLevel::Error,
                    &format!("Stage '{}' failed: {} (run: {})", stage, e, run),
                    "pipeline::stream",
                ),
            }

            // Nobody may be listening once the stream was dropped unfinished
            let _ = outcome_tx.send(StageOutcome {
                result,
                duration,
                bytes_written,
            });
        })
        .map_err(|e| PipeError::SpawnFailed(format!("{}: {}", name, e)))?;

    Ok((
        BufReader::new(reader),
        StageWorker {
            name,
            started,
            outcome,
            output_drained,
        },
    ))
}

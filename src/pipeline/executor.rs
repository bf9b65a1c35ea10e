use super::core::{PipelineResult, Transform};
use super::lines::DEFAULT_MAX_LINE_LEN;
use super::stream::Stream;
use crate::error::PipeResult;
use crate::logger::{LogLevel, LOGGER};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

/// An ordered list of transforms applied to a source stream
///
/// # Example
/// ```
/// use streampipe_lib::pipeline::{Pipeline, Stream};
/// use streampipe_lib::pipeline::stages::{PrefixStage, UppercaseStage};
///
/// let pipeline = Pipeline::builder("shout")
///     .add_stage(UppercaseStage::new())
///     .add_stage(PrefixStage::new())
///     .build();
///
/// let mut out = Vec::new();
/// let result = pipeline.execute(Stream::new("hi\n").unwrap(), &mut out).unwrap();
///
/// assert!(result.success);
/// assert_eq!(out, b"PREFIX: HI\n");
/// ```
pub struct Pipeline {
    name: String,
    stages: Vec<Arc<dyn Transform>>,
    max_line_len: usize,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Get the pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of transform stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Pipe `source` through every stage, without reading anything
    ///
    /// With no stages the source comes back unchanged.
    pub fn attach(&self, source: Stream) -> PipeResult<Stream> {
        self.stages
            .iter()
            .try_fold(source, |stream, stage| stream.pipe_shared(Arc::clone(stage)))
    }

    /// Run the pipeline and copy its output to `sink` line by line
    ///
    /// Each output line is written with a trailing newline as soon as it
    /// arrives. A failure in any stage, a read failure while draining, or a
    /// failed write to `sink` ends the run; the returned result then has
    /// `success == false` and carries the error. `Err` is only returned when
    /// the stages could not be started at all.
    pub fn execute(&self, source: Stream, sink: &mut dyn Write) -> PipeResult<PipelineResult> {
        let run_id = source.run_id().to_string();
        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Starting pipeline '{}' with {} stages (run: {})",
                self.name,
                self.stages.len(),
                run_id
            ),
            "pipeline",
        );

        let pipeline_start = Instant::now();
        let mut stream = self.attach(source)?;

        let mut lines_emitted = 0u64;
        let drain_error = self.drain(&mut stream, sink, &mut lines_emitted).err();
        if let Some(e) = &drain_error {
            LOGGER.log(
                LogLevel::Error,
                &format!(
                    "Error reading from final stream of '{}': {} (run: {})",
                    self.name, e, run_id
                ),
                "pipeline",
            );
        }

        let report = stream.finish();
        let total_duration = pipeline_start.elapsed();

        // A drain failure is what made the stages see their consumer vanish
        let error = drain_error.or(report.error);
        let stage_results = report.stage_results;

        match error {
            None => {
                LOGGER.log(
                    LogLevel::Info,
                    &format!(
                        "Pipeline '{}' completed: {} lines in {:.3}s (run: {})",
                        self.name,
                        lines_emitted,
                        total_duration.as_secs_f64(),
                        run_id
                    ),
                    "pipeline",
                );
                Ok(PipelineResult {
                    pipeline_name: self.name.clone(),
                    run_id,
                    success: true,
                    stage_results,
                    total_duration,
                    lines_emitted,
                    error: None,
                })
            }
            Some(e) => {
                LOGGER.log(
                    LogLevel::Error,
                    &format!("Pipeline '{}' failed: {} (run: {})", self.name, e, run_id),
                    "pipeline",
                );
                Ok(PipelineResult {
                    pipeline_name: self.name.clone(),
                    run_id,
                    success: false,
                    stage_results,
                    total_duration,
                    lines_emitted,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    fn drain(&self, stream: &mut Stream, sink: &mut dyn Write, lines: &mut u64) -> PipeResult<()> {
        for line in stream.lines(self.max_line_len) {
            let line = line?;
            sink.write_all(&line)?;
            sink.write_all(b"\n")?;
            *lines += 1;
        }
        sink.flush()?;
        Ok(())
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Arc<dyn Transform>>,
    max_line_len: usize,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    /// Add a stage to the pipeline
    pub fn add_stage<T: Transform>(mut self, stage: T) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Add a boxed stage to the pipeline
    pub fn add_boxed_stage(mut self, stage: Box<dyn Transform>) -> Self {
        self.stages.push(Arc::from(stage));
        self
    }

    /// Longest line the final drain accepts
    pub fn max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            name: self.name,
            stages: self.stages,
            max_line_len: self.max_line_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipeError;
    use crate::pipeline::core::transform_fn;
    use crate::pipeline::stages::{PrefixStage, UppercaseStage};
    use std::io;

    fn standard() -> Pipeline {
        Pipeline::builder("test-pipeline")
            .add_stage(UppercaseStage::new())
            .add_stage(PrefixStage::new())
            .build()
    }

    #[test]
    fn test_pipeline_success() {
        let mut out = Vec::new();
        let result = standard()
            .execute(Stream::new("hello\nworld\nthis is a test\n").unwrap(), &mut out)
            .unwrap();

        assert!(result.success);
        assert_eq!(result.lines_emitted, 3);
        assert_eq!(result.stage_results.len(), 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "PREFIX: HELLO\nPREFIX: WORLD\nPREFIX: THIS IS A TEST\n"
        );
    }

    #[test]
    fn test_pipeline_without_stages_is_identity() {
        let pipeline = Pipeline::builder("empty").build();
        assert_eq!(pipeline.stage_count(), 0);

        let stream = pipeline.attach(Stream::new("a\r\nb").unwrap()).unwrap();
        assert_eq!(stream.into_bytes().unwrap(), b"a\r\nb");
    }

    #[test]
    fn test_pipeline_failure() {
        let pipeline = Pipeline::builder("test-pipeline")
            .add_stage(UppercaseStage::new())
            .add_stage(transform_fn("Reject", |_input, _output| {
                Err(PipeError::GenericError("rejected".to_string()))
            }))
            .add_stage(PrefixStage::new())
            .build();

        let mut out = Vec::new();
        let result = pipeline.execute(Stream::new("a\nb\n").unwrap(), &mut out).unwrap();

        assert!(!result.success);
        assert!(out.is_empty());
        assert_eq!(
            result.failed_stage().map(|s| s.stage_name.as_str()),
            Some("Reject")
        );
        assert_eq!(
            result.error.as_deref(),
            Some("Stage 'Reject' failed: rejected")
        );
    }

    #[test]
    fn test_terminal_line_too_long() {
        let pipeline = Pipeline::builder("narrow").max_line_len(4).build();

        let mut out = Vec::new();
        let result = pipeline
            .execute(Stream::new("ok\nmuch too long\nnever\n").unwrap(), &mut out)
            .unwrap();

        assert!(!result.success);
        assert_eq!(out, b"ok\n");
        assert_eq!(result.lines_emitted, 1);
        assert!(result.error.unwrap().contains("maximum length of 4"));
    }

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_stops_run() {
        let result = standard()
            .execute(Stream::new("a\nb\nc\n").unwrap(), &mut ClosedSink)
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.lines_emitted, 0);
        assert!(result.error.unwrap().contains("stdout closed"));
    }

    #[test]
    fn test_boxed_stage() {
        let boxed: Box<dyn Transform> = Box::new(UppercaseStage::new());
        let pipeline = Pipeline::builder("boxed").add_boxed_stage(boxed).build();

        let mut out = Vec::new();
        let result = pipeline.execute(Stream::new("x\n").unwrap(), &mut out).unwrap();
        assert!(result.success);
        assert_eq!(out, b"X\n");
    }

    #[test]
    fn test_pipeline_runs_twice() {
        let pipeline = standard();
        for _ in 0..2 {
            let mut out = Vec::new();
            let result = pipeline.execute(Stream::new("again\n").unwrap(), &mut out).unwrap();
            assert!(result.success);
            assert_eq!(out, b"PREFIX: AGAIN\n");
        }
    }
}

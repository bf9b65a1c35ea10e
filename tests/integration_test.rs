use crossbeam_channel::bounded;
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;
use streampipe_lib::config::{InputSource, PipelineConfig};
use streampipe_lib::error::{PipeError, PipeResult};
use streampipe_lib::logger::LogLevel;
use streampipe_lib::pipeline::stages::{PrefixStage, UppercaseStage};
use streampipe_lib::pipeline::{Pipeline, Stream, DEFAULT_MAX_LINE_LEN};
use tempfile::TempDir;

const PATIENCE: Duration = Duration::from_secs(5);

/// Input that yields `first` once and then blocks like an idle terminal
struct IdleTerminal {
    first: Option<Vec<u8>>,
    hang_up: crossbeam_channel::Receiver<()>,
}

impl Read for IdleTerminal {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(first) = self.first.take() {
            let len = first.len().min(buf.len());
            buf[..len].copy_from_slice(&first[..len]);
            return Ok(len);
        }
        let _ = self.hang_up.recv();
        Ok(0)
    }
}

fn standard_stream(source: Stream) -> Stream {
    source
        .pipe(UppercaseStage::new())
        .unwrap()
        .pipe(PrefixStage::new())
        .unwrap()
}

fn collect_lines(stream: &mut Stream) -> Vec<String> {
    stream
        .lines(DEFAULT_MAX_LINE_LEN)
        .map(|line| String::from_utf8(line.unwrap()).unwrap())
        .collect()
}

/// The sample input comes out uppercased and prefixed, in order
#[test]
fn test_end_to_end_scenario() {
    let mut stream = standard_stream(Stream::new("hello\nworld\nthis is a test\n").unwrap());

    assert_eq!(
        collect_lines(&mut stream),
        vec!["PREFIX: HELLO", "PREFIX: WORLD", "PREFIX: THIS IS A TEST"]
    );

    let results = stream.finish().into_result().unwrap();
    let names: Vec<&str> = results.iter().map(|r| r.stage_name.as_str()).collect();
    assert_eq!(names, vec!["Source", "Uppercase Lines", "Insert Prefix"]);
}

#[test]
fn test_zero_transforms_is_identity() {
    let input = "mixed Case\r\n\nno newline at end";
    let stream = Stream::new(input).unwrap();
    assert_eq!(stream.into_bytes().unwrap(), input.as_bytes());
}

#[test]
fn test_empty_line_becomes_bare_prefix() {
    let mut stream = standard_stream(Stream::new("a\n\nb\n").unwrap());
    assert_eq!(collect_lines(&mut stream), vec!["PREFIX: A", "PREFIX: ", "PREFIX: B"]);
    assert!(stream.finish().error.is_none());
}

#[test]
fn test_line_count_and_order_preserved() {
    let input: String = (0..1000).map(|i| format!("line {}\n", i)).collect();
    let mut stream = standard_stream(Stream::new(input).unwrap());

    let lines = collect_lines(&mut stream);
    assert_eq!(lines.len(), 1000);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line, &format!("PREFIX: LINE {}", i));
    }
    assert!(stream.finish().error.is_none());
}

/// The first output line is visible while the producer is still mid-input
#[test]
fn test_first_line_arrives_before_producer_finishes() {
    let (gate_tx, gate_rx) = bounded::<()>(0);
    let source = Stream::from_producer("Slow", move |out| {
        out.write_all(b"first\n")?;
        // Held here until the consumer has seen the first line
        gate_rx.recv().map_err(|e| e.to_string())?;
        out.write_all(b"second\n")?;
        Ok(())
    })
    .unwrap();
    let mut stream = standard_stream(source);

    let (line_tx, line_rx) = bounded(2);
    let consumer = thread::spawn(move || {
        for line in stream.lines(DEFAULT_MAX_LINE_LEN) {
            line_tx.send(line.unwrap()).unwrap();
        }
        stream.finish()
    });

    assert_eq!(line_rx.recv_timeout(PATIENCE).unwrap(), b"PREFIX: FIRST");
    gate_tx.send_timeout((), PATIENCE).unwrap();
    assert_eq!(line_rx.recv_timeout(PATIENCE).unwrap(), b"PREFIX: SECOND");

    let report = consumer.join().unwrap();
    assert!(report.error.is_none());
}

/// Dropping the final stream unblocks every writer upstream
#[test]
fn test_abandoned_reader_unblocks_source() {
    let (done_tx, done_rx) = bounded(1);
    let source = Stream::from_producer("Endless", move |out| {
        let failure = loop {
            if let Err(e) = out.write_all(b"again\n") {
                break e;
            }
        };
        let _ = done_tx.send(failure.kind());
        Err(failure.into())
    })
    .unwrap();
    let mut stream = standard_stream(source);

    let first = stream.lines(DEFAULT_MAX_LINE_LEN).next().unwrap().unwrap();
    assert_eq!(first, b"PREFIX: AGAIN");
    drop(stream);

    assert_eq!(
        done_rx.recv_timeout(PATIENCE).unwrap(),
        io::ErrorKind::BrokenPipe
    );
}

/// Finishing early collects every worker and reports the abandonment
#[test]
fn test_finish_before_end_of_stream() {
    let source = Stream::from_producer("Endless", |out| loop {
        out.write_all(b"more\n")?;
    })
    .unwrap();
    let mut stream = standard_stream(source);
    assert!(stream.lines(DEFAULT_MAX_LINE_LEN).next().is_some());

    let (report_tx, report_rx) = bounded(1);
    thread::spawn(move || {
        let _ = report_tx.send(stream.finish());
    });

    let report = report_rx.recv_timeout(PATIENCE).unwrap();
    assert_eq!(report.stage_results.len(), 3);
    assert!(report.stage_results.iter().all(|r| r.abandoned));
    match report.error {
        Some(PipeError::ConsumerGone { stage }) => assert_eq!(stage, "Insert Prefix"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_failing_stage_is_fatal_for_run() {
    use std::io::BufRead;
    let pipeline = Pipeline::builder("fragile")
        .add_stage(UppercaseStage::new())
        .add_stage(streampipe_lib::pipeline::transform_fn(
            "Refuse Second Line",
            |input, output| -> PipeResult<()> {
                let mut first = String::new();
                input.read_line(&mut first)?;
                output.write_all(first.as_bytes())?;
                Err(PipeError::GenericError("second line refused".to_string()))
            },
        ))
        .add_stage(PrefixStage::new())
        .build();

    let mut out = Vec::new();
    let result = pipeline
        .execute(Stream::new("one\ntwo\nthree\n").unwrap(), &mut out)
        .unwrap();

    assert!(!result.success);
    assert_eq!(out, b"PREFIX: ONE\n");
    assert_eq!(
        result.failed_stage().unwrap().stage_name,
        "Refuse Second Line"
    );
}

#[test]
fn test_run_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("input.txt");
    std::fs::write(&path, "alpha\r\nbeta\n\ngamma").unwrap();

    let config = PipelineConfig::builder()
        .input(InputSource::File(path))
        .prefix("~ ")
        .log_level(LogLevel::Info)
        .build()
        .unwrap();

    let mut out = Vec::new();
    let result = streampipe_lib::run(&config, &mut out).unwrap();

    assert!(result.success);
    assert_eq!(result.lines_emitted, 4);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "~ ALPHA\n~ BETA\n~ \n~ GAMMA\n"
    );
    assert_eq!(result.stage_results[0].stage_name, "File");
}

#[test]
fn test_run_reports_run_id() {
    let config = PipelineConfig::builder()
        .log_level(LogLevel::Info)
        .build()
        .unwrap();

    let mut out = Vec::new();
    let result = streampipe_lib::run(&config, &mut out).unwrap();
    assert!(result.success);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "PREFIX: HELLO\nPREFIX: WORLD\nPREFIX: THIS IS A TEST\n"
    );
    assert!(uuid::Uuid::parse_str(&result.run_id).is_ok());
}

#[test]
fn test_run_reports_overlong_line() {
    let config = PipelineConfig::builder()
        .input(InputSource::Literal("short\nthis line is too long\n".to_string()))
        .max_line_len(16)
        .log_level(LogLevel::Info)
        .build()
        .unwrap();

    let mut out = Vec::new();
    let result = streampipe_lib::run(&config, &mut out).unwrap();

    assert!(!result.success);
    assert_eq!(out, b"PREFIX: SHORT\n");
    assert_eq!(
        result.failed_stage().unwrap().stage_name,
        "Uppercase Lines"
    );
    assert!(result.error.unwrap().contains("maximum length of 16"));
}

/// A failed run reports promptly even when its input never reaches end of file
#[test]
fn test_failed_run_does_not_wait_for_blocked_input() {
    let (hang_up_tx, hang_up_rx) = bounded::<()>(0);
    let input = IdleTerminal {
        first: Some(b"toolong\n".to_vec()),
        hang_up: hang_up_rx,
    };
    let pipeline = Pipeline::builder("interactive")
        .add_stage(UppercaseStage::new())
        .add_stage(PrefixStage::new())
        .max_line_len(4)
        .build();

    let (result_tx, result_rx) = bounded(1);
    thread::spawn(move || {
        let mut out = Vec::new();
        let source = Stream::from_reader("Stdin", input).unwrap();
        let _ = result_tx.send(pipeline.execute(source, &mut out).unwrap());
    });

    let result = result_rx.recv_timeout(PATIENCE).unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("maximum length of 4"));
    assert_eq!(result.stage_results[0].stage_name, "Stdin");
    assert!(result.stage_results[0].abandoned);
    drop(hang_up_tx);
}

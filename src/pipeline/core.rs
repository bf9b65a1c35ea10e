use crate::error::PipeResult;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::time::Duration;

/// A single stage in a pipeline
///
/// A transform reads its upstream byte stream and writes its own output. It
/// runs once, on its own worker thread, for each `Stream::pipe` call.
///
/// The output is only borrowed for the duration of `apply`; closing it is the
/// worker's job and happens right after `apply` returns.
///
/// # Example
/// ```
/// use std::io::{BufRead, Write};
/// use streampipe_lib::error::PipeResult;
/// use streampipe_lib::pipeline::Transform;
///
/// struct Reverse;
///
/// impl Transform for Reverse {
///     fn apply(&self, input: &mut dyn BufRead, output: &mut dyn Write) -> PipeResult<()> {
///         for line in input.lines() {
///             let line: String = line?.chars().rev().collect();
///             writeln!(output, "{}", line)?;
///         }
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "Reverse"
///     }
/// }
/// ```
pub trait Transform: Send + Sync + 'static {
    /// Consume `input` and write the transformed stream to `output`
    ///
    /// Returning an error fails the whole pipeline run.
    fn apply(&self, input: &mut dyn BufRead, output: &mut dyn Write) -> PipeResult<()>;

    /// Get stage name for logging and run summaries
    fn name(&self) -> &str;
}

/// Transform backed by a closure, see [`transform_fn`]
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&mut dyn BufRead, &mut dyn Write) -> PipeResult<()> + Send + Sync + 'static,
{
    fn apply(&self, input: &mut dyn BufRead, output: &mut dyn Write) -> PipeResult<()> {
        (self.f)(input, output)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a closure as a named transform
pub fn transform_fn<F>(name: impl Into<String>, f: F) -> FnTransform<F>
where
    F: Fn(&mut dyn BufRead, &mut dyn Write) -> PipeResult<()> + Send + Sync + 'static,
{
    FnTransform {
        name: name.into(),
        f,
    }
}

/// Result of a single stage's worker
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    /// Stage name
    pub stage_name: String,

    /// Whether the stage succeeded
    pub success: bool,

    /// Error message if failed
    pub error: Option<String>,

    /// Wall time of the worker, from spawn to close
    pub duration: Duration,

    /// Bytes the stage delivered downstream
    pub bytes_written: u64,

    /// Stopped because the downstream consumer went away
    pub abandoned: bool,
}

impl StageResult {
    /// Create a successful stage result
    pub fn success(stage_name: impl Into<String>, duration: Duration, bytes_written: u64) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: true,
            error: None,
            duration,
            bytes_written,
            abandoned: false,
        }
    }

    /// Create a failed stage result
    pub fn failure(
        stage_name: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
        bytes_written: u64,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: false,
            error: Some(error.into()),
            duration,
            bytes_written,
            abandoned: false,
        }
    }

    /// Create a result for a stage whose consumer stopped reading
    pub fn abandoned(
        stage_name: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
        bytes_written: u64,
    ) -> Self {
        Self {
            abandoned: true,
            ..Self::failure(stage_name, error, duration, bytes_written)
        }
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Pipeline name
    pub pipeline_name: String,

    /// Unique id of this run, as it appears in the logs
    pub run_id: String,

    /// Whether every stage and the final drain succeeded
    pub success: bool,

    /// Results from each stage, source first
    pub stage_results: Vec<StageResult>,

    /// Total duration
    pub total_duration: Duration,

    /// Lines delivered to the sink
    pub lines_emitted: u64,

    /// Error message if failed
    pub error: Option<String>,
}

impl PipelineResult {
    /// Get the stage that caused the failure (if any)
    ///
    /// Stages that only stopped because their consumer went away are skipped
    /// unless nothing else failed.
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.stage_results
            .iter()
            .find(|r| !r.success && !r.abandoned)
            .or_else(|| self.stage_results.iter().rev().find(|r| r.abandoned))
    }

    /// Bytes moved across every channel of the run
    pub fn total_bytes(&self) -> u64 {
        self.stage_results.iter().map(|r| r.bytes_written).sum()
    }

    /// Pretty JSON rendering of the run summary
    pub fn to_json(&self) -> PipeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

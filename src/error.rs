use thiserror::Error;

/// Central error type for the streampipe pipeline
#[derive(Error, Debug)]
pub enum PipeError {
    // ============================================================================
    // Stream Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Consumer of stage '{stage}' went away before end of stream")]
    ConsumerGone { stage: String },

    #[error("Line exceeds maximum length of {limit} bytes")]
    LineTooLong { limit: usize },

    // ============================================================================
    // Stage Errors
    // ============================================================================
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("Stage '{stage}' panicked")]
    StagePanicked { stage: String },

    #[error("Failed to spawn stage worker: {0}")]
    SpawnFailed(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Builder pattern validation error
    #[error("Builder error: {0}")]
    BuilderError(String),

    #[error("{0}")]
    GenericError(String),
}

impl PipeError {
    /// Attach a stage name to an error raised inside that stage's transform
    ///
    /// A broken pipe becomes `ConsumerGone`, errors that already name a stage
    /// are kept, everything else is wrapped in `StageFailed`.
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            PipeError::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                PipeError::ConsumerGone {
                    stage: stage.to_string(),
                }
            }
            e @ (PipeError::ConsumerGone { .. }
            | PipeError::StageFailed { .. }
            | PipeError::StagePanicked { .. }) => e,
            other => PipeError::StageFailed {
                stage: stage.to_string(),
                message: other.to_string(),
            },
        }
    }
}

// Automatic conversion from String (for ad-hoc transform errors)
impl From<String> for PipeError {
    fn from(err: String) -> Self {
        PipeError::GenericError(err)
    }
}

// Automatic conversion from &str
impl From<&str> for PipeError {
    fn from(err: &str) -> Self {
        PipeError::GenericError(err.to_string())
    }
}

// Helper type alias for Results
pub type PipeResult<T> = Result<T, PipeError>;

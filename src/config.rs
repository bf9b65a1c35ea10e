use crate::error::{PipeError, PipeResult};
use crate::logger::LogLevel;
use crate::pipeline::stages::DEFAULT_PREFIX;
use crate::pipeline::{Stream, DEFAULT_MAX_LINE_LEN};
use std::fs::File;
use std::path::PathBuf;

/// Text processed when no other input is configured
pub const DEFAULT_INPUT: &str = "hello\nworld\nthis is a test\n";

/// Where the pipeline's source stream comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// In-process text
    Literal(String),
    /// Standard input, read until end of file
    Stdin,
    /// A file on disk
    File(PathBuf),
}

impl InputSource {
    /// Start the source worker for this input
    pub fn open(&self) -> PipeResult<Stream> {
        match self {
            InputSource::Literal(text) => Stream::new(text.as_bytes()),
            InputSource::Stdin => Stream::from_reader("Stdin", std::io::stdin()),
            InputSource::File(path) => {
                let file = File::open(path).map_err(|e| {
                    PipeError::ConfigError(format!("cannot open {}: {}", path.display(), e))
                })?;
                Stream::from_reader("File", file)
            }
        }
    }
}

impl Default for InputSource {
    fn default() -> Self {
        InputSource::Literal(DEFAULT_INPUT.to_string())
    }
}

/// Settings for one run of the text pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: InputSource,
    pub prefix: String,
    pub max_line_len: usize,
    pub log_level: LogLevel,
    /// Print the run summary as JSON on stderr
    pub summary: bool,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: InputSource::default(),
            prefix: DEFAULT_PREFIX.to_string(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            log_level: LogLevel::Warn,
            summary: false,
        }
    }
}

/// Builder for constructing PipelineConfig instances with a fluent API
///
/// # Example
/// ```
/// use streampipe_lib::config::{InputSource, PipelineConfigBuilder};
///
/// let config = PipelineConfigBuilder::new()
///     .input(InputSource::Literal("one\ntwo\n".to_string()))
///     .prefix(">> ")
///     .max_line_len(256)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.prefix, ">> ");
/// ```
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    input: Option<InputSource>,
    prefix: Option<String>,
    max_line_len: Option<usize>,
    log_level: Option<LogLevel>,
    summary: bool,
}

impl PipelineConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the input source
    pub fn input(mut self, input: InputSource) -> Self {
        self.input = Some(input);
        self
    }

    /// Set the prefix inserted in front of every line
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the longest line any stage accepts
    pub fn max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = Some(max_line_len);
        self
    }

    /// Set the minimum level recorded by the logger
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the log level by name ("debug", "info", "warn", "error")
    pub fn log_level_name(mut self, name: &str) -> PipeResult<Self> {
        let level = LogLevel::parse(name)
            .ok_or_else(|| PipeError::BuilderError(format!("Unknown log level: {}", name)))?;
        self.log_level = Some(level);
        Ok(self)
    }

    /// Set whether to print the run summary
    pub fn summary(mut self, summary: bool) -> Self {
        self.summary = summary;
        self
    }

    /// Build the PipelineConfig instance
    ///
    /// # Errors
    /// Returns `PipeError::BuilderError` if a field is invalid
    pub fn build(self) -> PipeResult<PipelineConfig> {
        let defaults = PipelineConfig::default();

        let max_line_len = self.max_line_len.unwrap_or(defaults.max_line_len);
        if max_line_len == 0 {
            return Err(PipeError::BuilderError(
                "max_line_len must be greater than zero".to_string(),
            ));
        }

        let prefix = self.prefix.unwrap_or(defaults.prefix);
        if prefix.contains('\n') {
            return Err(PipeError::BuilderError(
                "prefix must not contain a newline".to_string(),
            ));
        }

        let input = self.input.unwrap_or(defaults.input);
        if let InputSource::File(path) = &input {
            if path.as_os_str().is_empty() {
                return Err(PipeError::BuilderError("input file path is empty".to_string()));
            }
        }

        Ok(PipelineConfig {
            input,
            prefix,
            max_line_len,
            log_level: self.log_level.unwrap_or(defaults.log_level),
            summary: self.summary,
        })
    }
}

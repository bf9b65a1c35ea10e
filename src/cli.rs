use std::path::PathBuf;

use clap::Parser;

use crate::config::{InputSource, PipelineConfig, PipelineConfigBuilder};
use crate::error::PipeResult;
use crate::pipeline::stages::DEFAULT_PREFIX;
use crate::pipeline::DEFAULT_MAX_LINE_LEN;

#[derive(Debug, Parser, Clone)]
#[command(name = "streampipe")]
#[command(about = "Uppercase and prefix text through a pipeline of concurrent stages")]
pub struct Cli {
    /// Text to process instead of the built-in sample.
    #[arg(long, conflicts_with_all = ["file", "stdin"])]
    pub input: Option<String>,

    /// Read input from a file.
    #[arg(long, conflicts_with = "stdin")]
    pub file: Option<PathBuf>,

    /// Read input from standard input.
    #[arg(long)]
    pub stdin: bool,

    /// Prefix inserted in front of every output line.
    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Longest accepted line, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_LEN)]
    pub max_line_len: usize,

    /// Minimum log level (debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Print a JSON run summary on stderr.
    #[arg(long)]
    pub summary: bool,
}

impl Cli {
    pub fn input_source(&self) -> InputSource {
        if let Some(text) = &self.input {
            InputSource::Literal(text.clone())
        } else if let Some(path) = &self.file {
            InputSource::File(path.clone())
        } else if self.stdin {
            InputSource::Stdin
        } else {
            InputSource::default()
        }
    }

    pub fn into_config(self) -> PipeResult<PipelineConfig> {
        PipelineConfigBuilder::new()
            .input(self.input_source())
            .prefix(self.prefix)
            .max_line_len(self.max_line_len)
            .summary(self.summary)
            .log_level_name(&self.log_level)?
            .build()
    }
}

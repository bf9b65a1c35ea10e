//! Concurrent line-oriented text pipeline
//!
//! Text from a source is streamed through a chain of transform stages, each
//! on its own worker, connected by unbuffered byte channels. The default
//! chain uppercases every line and then inserts a prefix.

use std::io::Write;

pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod pipeline;

use config::PipelineConfig;
use error::PipeResult;
use logger::{LogLevel, LOGGER};
use pipeline::stages::{PrefixStage, UppercaseStage};
use pipeline::{Pipeline, PipelineResult};

/// Name of the standard uppercase-then-prefix pipeline
pub const PIPELINE_NAME: &str = "uppercase-prefix";

/// Build the uppercase-then-prefix pipeline described by `config`
pub fn build_pipeline(config: &PipelineConfig) -> Pipeline {
    Pipeline::builder(PIPELINE_NAME)
        .add_stage(UppercaseStage::with_max_line_len(config.max_line_len))
        .add_stage(
            PrefixStage::with_prefix(config.prefix.clone()).max_line_len(config.max_line_len),
        )
        .max_line_len(config.max_line_len)
        .build()
}

/// Run the pipeline for `config`, writing output lines to `sink`
///
/// Stage and drain failures are reported through the returned result;
/// `Err` means the run could not start (unreadable input, spawn failure).
pub fn run(config: &PipelineConfig, sink: &mut dyn Write) -> PipeResult<PipelineResult> {
    LOGGER.set_min_level(config.log_level);
    LOGGER.log(
        LogLevel::Debug,
        &format!("Running with input {:?}", config.input),
        "run",
    );

    let source = config.input.open()?;
    build_pipeline(config).execute(source, sink)
}

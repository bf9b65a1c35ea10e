use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use streampipe_lib::cli::Cli;
use streampipe_lib::config::PipelineConfig;

fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("streampipe: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);

    let stdout = io::stdout();
    let mut sink = stdout.lock();
    let result = match streampipe_lib::run(&config, &mut sink) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("streampipe: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.summary {
        match result.to_json() {
            Ok(json) => eprintln!("{}", json),
            Err(e) => eprintln!("streampipe: failed to encode summary: {}", e),
        }
    }

    match result.error {
        None => ExitCode::SUCCESS,
        Some(error) => {
            eprintln!("Error reading from final stream: {}", error);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout carries only pipeline output
fn init_tracing(config: &PipelineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

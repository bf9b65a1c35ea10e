use std::sync::atomic::{AtomicU8, Ordering};

/// Log level enum for type-safe logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Process-wide logger
///
/// Drops records below a minimum level that can be changed while stages are
/// running, and hands the rest to `tracing` under the `streampipe` target with
/// the producing module as the `source` field. Where they end up is up to the
/// installed subscriber.
pub struct Logger {
    min_level: AtomicU8,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            min_level: AtomicU8::new(LogLevel::Debug as u8),
        }
    }

    /// Whether a record at `level` passes the minimum level
    pub fn enabled(&self, level: LogLevel) -> bool {
        level as u8 >= self.min_level.load(Ordering::Relaxed)
    }

    pub fn log(&self, level: LogLevel, message: &str, source: &'static str) {
        if !self.enabled(level) {
            return;
        }

        match level {
            LogLevel::Error => tracing::error!(target: "streampipe", source, "{}", message),
            LogLevel::Warn => tracing::warn!(target: "streampipe", source, "{}", message),
            LogLevel::Info => tracing::info!(target: "streampipe", source, "{}", message),
            LogLevel::Debug => tracing::debug!(target: "streampipe", source, "{}", message),
        }
    }

    /// Set minimum log level (runtime filtering)
    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::Relaxed);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

// Global logger instance
lazy_static::lazy_static! {
    pub static ref LOGGER: Logger = Logger::new();
}

use crate::error::PipeResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::lines::{LineScanner, DEFAULT_MAX_LINE_LEN};
use crate::pipeline::Transform;
use std::io::{BufRead, Write};

/// Prefix inserted when none is configured
pub const DEFAULT_PREFIX: &str = "PREFIX: ";

/// Stage that writes `prefix + line` for every line
///
/// Line bytes are copied untouched. Empty lines become just the prefix.
pub struct PrefixStage {
    prefix: String,
    max_line_len: usize,
}

impl PrefixStage {
    /// Create a prefix stage using [`DEFAULT_PREFIX`]
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    pub fn max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for PrefixStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for PrefixStage {
    fn apply(&self, input: &mut dyn BufRead, output: &mut dyn Write) -> PipeResult<()> {
        let mut count = 0u64;
        for line in LineScanner::with_max_line_len(input, self.max_line_len) {
            let line = line?;
            // One write per line keeps lines whole on the channel
            let mut out = Vec::with_capacity(self.prefix.len() + line.len() + 1);
            out.extend_from_slice(self.prefix.as_bytes());
            out.extend_from_slice(&line);
            out.push(b'\n');
            output.write_all(&out)?;
            count += 1;
        }

        LOGGER.log(
            LogLevel::Debug,
            &format!("Prefixed {} lines with {:?}", count, self.prefix),
            "pipeline::prefix",
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "Insert Prefix"
    }
}

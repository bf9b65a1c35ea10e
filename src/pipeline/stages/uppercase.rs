use crate::error::PipeResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::lines::{LineScanner, DEFAULT_MAX_LINE_LEN};
use crate::pipeline::Transform;
use std::io::{BufRead, Write};

/// Stage that uppercases each line
///
/// Lines are decoded as UTF-8, with invalid sequences replaced by U+FFFD,
/// and uppercased one character at a time. A character whose uppercase form
/// is more than one character (`ß`, `ŉ`) is kept as is, so the character
/// count of a line never changes. Every line, empty ones included, is written
/// back newline-terminated in input order.
///
/// # Example
/// ```
/// use streampipe_lib::pipeline::Stream;
/// use streampipe_lib::pipeline::stages::UppercaseStage;
///
/// let stream = Stream::new("hello\nstraße\n")
///     .unwrap()
///     .pipe(UppercaseStage::new())
///     .unwrap();
///
/// assert_eq!(stream.into_bytes().unwrap(), "HELLO\nSTRAßE\n".as_bytes());
/// ```
pub struct UppercaseStage {
    max_line_len: usize,
}

impl UppercaseStage {
    /// Create a new uppercase stage
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self { max_line_len }
    }
}

impl Default for UppercaseStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for UppercaseStage {
    fn apply(&self, input: &mut dyn BufRead, output: &mut dyn Write) -> PipeResult<()> {
        let mut count = 0u64;
        for line in LineScanner::with_max_line_len(input, self.max_line_len) {
            let line = line?;
            let upper: String = String::from_utf8_lossy(&line).chars().map(upper_char).collect();
            let mut out = upper.into_bytes();
            out.push(b'\n');
            output.write_all(&out)?;
            count += 1;
        }

        LOGGER.log(
            LogLevel::Debug,
            &format!("Uppercased {} lines", count),
            "pipeline::uppercase",
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "Uppercase Lines"
    }
}

/// Single-character uppercase mapping of `c`, or `c` itself
fn upper_char(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

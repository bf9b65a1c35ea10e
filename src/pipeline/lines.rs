use crate::error::{PipeError, PipeResult};
use std::io::{BufRead, ErrorKind};

/// Longest line accepted by default (64 KiB)
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Iterator over newline-separated lines of a byte stream
///
/// Lines are yielded without their `\n` (and without a trailing `\r`). A final
/// fragment with no newline is still a line. Lines are produced as soon as
/// their newline arrives, so the scanner never waits for end of stream.
///
/// The first error ends the iteration.
pub struct LineScanner<R> {
    reader: R,
    max_line_len: usize,
    done: bool,
}

impl<R: BufRead> LineScanner<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_line_len(reader, DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_line_len(reader: R, max_line_len: usize) -> Self {
        Self {
            reader,
            max_line_len,
            done: false,
        }
    }

    fn next_line(&mut self) -> PipeResult<Option<Vec<u8>>> {
        let mut line = Vec::new();
        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if available.is_empty() {
                // End of stream
                return Ok(if line.is_empty() { None } else { Some(line) });
            }

            let (consumed, found) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            };
            let content = if found { consumed - 1 } else { consumed };
            line.extend_from_slice(&available[..content]);
            self.reader.consume(consumed);

            if found {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if line.len() > self.max_line_len {
                    return Err(PipeError::LineTooLong {
                        limit: self.max_line_len,
                    });
                }
                return Ok(Some(line));
            }

            // A trailing '\r' may still be stripped, allow one extra byte
            if line.len() > self.max_line_len + 1 {
                return Err(PipeError::LineTooLong {
                    limit: self.max_line_len,
                });
            }
        }
    }
}

impl<R: BufRead> Iterator for LineScanner<R> {
    type Item = PipeResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Create a connected writer/reader pair
///
/// The channel has no capacity: every `write` hands its bytes directly to the
/// reader and blocks until the reader has taken them. This is what carries
/// backpressure from the last stage of a pipeline back to its source.
///
/// # Example
/// ```
/// use std::io::{Read, Write};
/// use streampipe_lib::pipeline::byte_channel;
///
/// let (mut writer, mut reader) = byte_channel();
/// let producer = std::thread::spawn(move || {
///     writer.write_all(b"hello").unwrap();
///     writer.close();
/// });
///
/// let mut out = String::new();
/// reader.read_to_string(&mut out).unwrap();
/// producer.join().unwrap();
/// assert_eq!(out, "hello");
/// ```
pub fn byte_channel() -> (ChannelWriter, ChannelReader) {
    let (sender, receiver) = bounded(0);
    (
        ChannelWriter {
            sender,
            bytes_written: 0,
        },
        ChannelReader {
            receiver,
            pending: Vec::new(),
            offset: 0,
            bytes_read: 0,
            at_end: Arc::new(AtomicBool::new(false)),
        },
    )
}

/// Write end of a byte channel
///
/// There is exactly one writer per channel. Closing consumes the handle, so a
/// second close or a write after close does not compile. Dropping the writer
/// closes it as well.
#[derive(Debug)]
pub struct ChannelWriter {
    sender: Sender<Vec<u8>>,
    bytes_written: u64,
}

impl ChannelWriter {
    /// Signal end of stream to the reader
    pub fn close(self) {
        drop(self);
    }

    /// Total bytes accepted by the reader so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // Fails instead of blocking once the reader has been dropped
        self.sender.send(buf.to_vec()).map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "byte channel reader dropped")
        })?;
        self.bytes_written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read end of a byte channel
///
/// `read` blocks until bytes arrive or the writer is gone. After the writer
/// closes and every chunk has been consumed, `read` returns `Ok(0)`.
#[derive(Debug)]
pub struct ChannelReader {
    receiver: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
    bytes_read: u64,
    at_end: Arc<AtomicBool>,
}

impl ChannelReader {
    /// Total bytes handed out by `read` so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Whether `read` has returned end of stream
    pub fn at_end(&self) -> bool {
        self.at_end.load(Ordering::Acquire)
    }

    /// Handle on the end-of-stream flag that outlives the reader
    pub(crate) fn end_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.at_end)
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.offset >= self.pending.len() {
            match self.receiver.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                // Writer closed and nothing left in flight
                Err(_) => {
                    self.at_end.store(true, Ordering::Release);
                    return Ok(0);
                }
            }
        }

        let available = &self.pending[self.offset..];
        let len = available.len().min(buf.len());
        buf[..len].copy_from_slice(&available[..len]);
        self.offset += len;
        self.bytes_read += len as u64;
        Ok(len)
    }
}

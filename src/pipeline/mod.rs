//! Streaming pipeline of concurrent text transforms
//!
//! A [`Stream`] is the read end of a byte channel. Each call to
//! [`Stream::pipe`] starts one worker thread that reads the current stream,
//! runs a [`Transform`] over it and writes into a fresh channel, returning the
//! stream for that channel. Channels have no buffer, so every stage runs
//! concurrently and a slow consumer stalls its producers all the way back to
//! the source. Nothing is ever held in memory as a whole.
//!
//! # Example
//! ```
//! use streampipe_lib::pipeline::Stream;
//! use streampipe_lib::pipeline::stages::{PrefixStage, UppercaseStage};
//!
//! let mut stream = Stream::new("hello\nworld\n")
//!     .unwrap()
//!     .pipe(UppercaseStage::new())
//!     .unwrap()
//!     .pipe(PrefixStage::new())
//!     .unwrap();
//!
//! let lines: Vec<Vec<u8>> = stream.lines(1024).collect::<Result<_, _>>().unwrap();
//! assert_eq!(lines, vec![b"PREFIX: HELLO".to_vec(), b"PREFIX: WORLD".to_vec()]);
//! assert!(stream.finish().error.is_none());
//! ```

pub mod channel;
pub mod core;
pub mod executor;
pub mod lines;
pub mod stages;
pub mod stream;

// Re-export main types
pub use channel::{byte_channel, ChannelReader, ChannelWriter};
pub use self::core::{transform_fn, FnTransform, PipelineResult, StageResult, Transform};
pub use executor::{Pipeline, PipelineBuilder};
pub use lines::{LineScanner, DEFAULT_MAX_LINE_LEN};
pub use stream::{StageReport, Stream, DETACH_GRACE, SOURCE_STAGE};

//! Frame sources.
//!
//! This module provides the sources the capture stage pulls from:
//! - Synthetic `stub://` streams (testing, demos)
//! - Local video files (feature: file-ffmpeg)
//!
//! Every source produces owned `Frame` values. A source that decodes into a
//! reused buffer copies out before returning, so the frame it hands over is
//! never touched by the source again.

pub mod file;
#[cfg(feature = "file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod synthetic;

use anyhow::Result;

use crate::frame::{Frame, StreamInfo};
use crate::uri::Location;

pub use file::FileSource;
pub use synthetic::SyntheticSource;

/// A video stream the capture stage reads from.
///
/// Opening happens in the constructor; an opened source is ready to read.
pub trait VideoSource: Send {
    /// Stream properties used to open the sink.
    fn info(&self) -> StreamInfo;

    /// Next frame. `Ok(None)` means the stream is exhausted; `Err` is a read
    /// failure mid-stream.
    fn read_next(&mut self) -> Result<Option<Frame>>;

    /// Frames handed out so far.
    fn frames_read(&self) -> u64;

    fn is_healthy(&self) -> bool {
        true
    }
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn info(&self) -> StreamInfo {
        (**self).info()
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        (**self).read_next()
    }

    fn frames_read(&self) -> u64 {
        (**self).frames_read()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
}

/// Open the source named by `input` (a `stub://` URI or a local file path).
pub fn open_source(input: &str) -> Result<Box<dyn VideoSource>> {
    match Location::parse(input)? {
        Location::Stub(stub) => Ok(Box::new(SyntheticSource::from_stub(&stub)?)),
        Location::Path(path) => Ok(Box::new(FileSource::open(&path)?)),
    }
}

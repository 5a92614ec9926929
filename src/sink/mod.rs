//! Frame sinks.
//!
//! The output stage is the only writer of a sink. Backends:
//! - `stub://<name>`: digest sink, hashes frames into a running chain
//! - `*.rgb` / `*.raw`: concatenated RGB24 frames
//! - any other local path: FFmpeg encoder (feature: file-ffmpeg)

pub mod digest;
#[cfg(feature = "file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod raw;

use anyhow::{anyhow, Result};

use crate::frame::{SequencedFrame, StreamInfo};
use crate::uri::Location;

pub use digest::{DigestSink, DigestSummary};
pub use raw::RawFileSink;

/// Where and how to write the output stream.
#[derive(Clone, Debug, Default)]
pub struct SinkConfig {
    /// `stub://` URI or local file path.
    pub uri: String,
    /// Encoder override; defaults to the source's codec.
    pub codec: Option<String>,
}

/// A video stream the output stage writes to.
///
/// Opening happens in the constructor. `finish` releases the sink (flushes
/// buffers, writes trailers) and is called by the orchestrator once every
/// stage has stopped.
pub trait VideoSink: Send {
    fn write(&mut self, frame: &SequencedFrame) -> Result<()>;

    fn finish(&mut self) -> Result<()>;

    fn frames_written(&self) -> u64;

    fn is_healthy(&self) -> bool {
        true
    }
}

impl<K: VideoSink + ?Sized> VideoSink for Box<K> {
    fn write(&mut self, frame: &SequencedFrame) -> Result<()> {
        (**self).write(frame)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn frames_written(&self) -> u64 {
        (**self).frames_written()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
}

/// Open the sink described by `config` for a stream shaped like `info`.
pub fn open_sink(config: &SinkConfig, info: &StreamInfo) -> Result<Box<dyn VideoSink>> {
    match Location::parse(&config.uri)? {
        Location::Stub(stub) => Ok(Box::new(DigestSink::new(&stub.name, info))),
        Location::Path(path) if RawFileSink::handles(&path) => {
            Ok(Box::new(RawFileSink::create(&path, info)?))
        }
        Location::Path(path) => open_encoded(&path, config.codec.as_deref(), info),
    }
}

#[cfg(feature = "file-ffmpeg")]
fn open_encoded(path: &str, codec: Option<&str>, info: &StreamInfo) -> Result<Box<dyn VideoSink>> {
    Ok(Box::new(file_ffmpeg::FfmpegFileSink::create(
        path, codec, info,
    )?))
}

#[cfg(not(feature = "file-ffmpeg"))]
fn open_encoded(path: &str, _codec: Option<&str>, _info: &StreamInfo) -> Result<Box<dyn VideoSink>> {
    Err(anyhow!(
        "encoding '{}' requires the file-ffmpeg feature (use a .rgb path or stub:// instead)",
        path
    ))
}

/// Reject frames whose dimensions differ from the stream the sink was opened for.
pub(crate) fn check_dimensions(frame: &SequencedFrame, info: &StreamInfo) -> Result<()> {
    let (w, h) = (frame.frame.width(), frame.frame.height());
    if w != info.width || h != info.height {
        return Err(anyhow!(
            "frame {} is {}x{}, sink expects {}x{}",
            frame.index,
            w,
            h,
            info.width,
            info.height
        ));
    }
    Ok(())
}

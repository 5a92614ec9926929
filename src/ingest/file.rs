//! Local file frame source.
//!
//! This module provides `FileSource` for decoding frames from local video files.
//! The file source is responsible for:
//! - Opening a local video file (no network access)
//! - Decoding video frames in-memory to RGB24
//! - Reporting stream metadata (size, rate, codec) for the sink
//! - Producing owned `Frame` instances
//!
//! Decoding requires the `file-ffmpeg` feature; without it, opening a file fails
//! as a setup error.

use anyhow::{anyhow, Result};

#[cfg(feature = "file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::VideoSource;
use crate::frame::{Frame, StreamInfo};

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    #[cfg(feature = "file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
    // Keeps the enum inhabited-but-unconstructible without a decoder backend.
    #[cfg(not(feature = "file-ffmpeg"))]
    #[allow(dead_code)]
    Unavailable(std::convert::Infallible),
}

impl FileSource {
    pub fn open(path: &str) -> Result<Self> {
        if !is_local_file_path(path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if !std::path::Path::new(path).is_file() {
            return Err(anyhow!("input file '{}' does not exist", path));
        }
        #[cfg(feature = "file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::open(path)?),
            })
        }
        #[cfg(not(feature = "file-ffmpeg"))]
        {
            Err(anyhow!(
                "decoding '{}' requires the file-ffmpeg feature",
                path
            ))
        }
    }
}

impl VideoSource for FileSource {
    fn info(&self) -> StreamInfo {
        match &self.backend {
            #[cfg(feature = "file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.info(),
            #[cfg(not(feature = "file-ffmpeg"))]
            FileBackend::Unavailable(never) => match *never {},
        }
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            #[cfg(feature = "file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.read_next(),
            #[cfg(not(feature = "file-ffmpeg"))]
            FileBackend::Unavailable(never) => match *never {},
        }
    }

    fn frames_read(&self) -> u64 {
        match &self.backend {
            #[cfg(feature = "file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.frames_read(),
            #[cfg(not(feature = "file-ffmpeg"))]
            FileBackend::Unavailable(never) => match *never {},
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            #[cfg(feature = "file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.is_healthy(),
            #[cfg(not(feature = "file-ffmpeg"))]
            FileBackend::Unavailable(never) => match *never {},
        }
    }
}

pub(crate) fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_url_schemes() {
        assert!(!is_local_file_path("http://example.com/a.mp4"));
        assert!(!is_local_file_path(""));
        assert!(is_local_file_path("/var/video/a.mp4"));
        assert!(FileSource::open("rtsp://cam/stream").is_err());
    }

    #[test]
    fn missing_file_fails_to_open() {
        let err = FileSource::open("/definitely/not/here.mp4")
            .err()
            .expect("missing file must fail");
        assert!(err.to_string().contains("does not exist"));
    }
}

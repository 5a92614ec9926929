//! Raw RGB24 file sink.
//!
//! Writes frames back to back with no container. The result can be played
//! with `ffplay -f rawvideo -pixel_format rgb24 -video_size WxH -framerate F`.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{check_dimensions, VideoSink};
use crate::frame::{SequencedFrame, StreamInfo};

const RAW_EXTENSIONS: &[&str] = &["rgb", "raw"];

pub struct RawFileSink {
    path: String,
    info: StreamInfo,
    writer: Option<BufWriter<File>>,
    frames: u64,
}

impl RawFileSink {
    /// True when `path` has an extension this sink writes.
    pub fn handles(path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| RAW_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    pub fn create(path: &str, info: &StreamInfo) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create output file {}", path))?;
        log::info!(
            "RawFileSink: writing {}x{} rgb24 @ {:.2} fps to {}",
            info.width,
            info.height,
            info.fps,
            path
        );
        Ok(Self {
            path: path.to_string(),
            info: info.clone(),
            writer: Some(BufWriter::new(file)),
            frames: 0,
        })
    }
}

impl VideoSink for RawFileSink {
    fn write(&mut self, frame: &SequencedFrame) -> Result<()> {
        check_dimensions(frame, &self.info)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("{} already closed", self.path))?;
        writer
            .write_all(frame.frame.pixels())
            .with_context(|| format!("failed to write frame {} to {}", frame.index, self.path))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .flush()
            .with_context(|| format!("failed to flush {}", self.path))?;
        writer
            .get_ref()
            .sync_all()
            .with_context(|| format!("failed to sync {}", self.path))?;
        log::info!("RawFileSink: {} closed after {} frames", self.path, self.frames);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn is_healthy(&self) -> bool {
        self.writer.is_some()
    }
}

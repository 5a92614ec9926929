//! Digest sink for `stub://` outputs.
//!
//! Nothing is stored. Each written frame's SHA-256 is folded into a running
//! chain, `chain = H(chain || frame_digest)`, so two runs produce the same
//! chain only if they wrote the same frames in the same order.

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

use super::{check_dimensions, VideoSink};
use crate::frame::{SequencedFrame, StreamInfo};

/// Hash a frame digest onto the previous chain value.
pub fn chain_digest(prev: &[u8; 32], frame_digest: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prev);
    hasher.update(frame_digest);
    hasher.finalize().into()
}

/// What a digest sink has seen so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigestSummary {
    pub frames: u64,
    pub chain: [u8; 32],
    pub last_index: Option<u64>,
    pub finished: bool,
}

impl DigestSummary {
    pub fn chain_hex(&self) -> String {
        hex::encode(self.chain)
    }
}

pub struct DigestSink {
    name: String,
    info: StreamInfo,
    summary: Arc<Mutex<DigestSummary>>,
}

impl DigestSink {
    pub fn new(name: &str, info: &StreamInfo) -> Self {
        log::info!(
            "DigestSink: opened stub://{} ({}x{})",
            name,
            info.width,
            info.height
        );
        Self {
            name: name.to_string(),
            info: info.clone(),
            summary: Arc::new(Mutex::new(DigestSummary::default())),
        }
    }

    /// Shared view of the running summary; stays readable after the sink is
    /// moved into a pipeline.
    pub fn summary_handle(&self) -> Arc<Mutex<DigestSummary>> {
        self.summary.clone()
    }

    pub fn summary(&self) -> Result<DigestSummary> {
        let guard = self
            .summary
            .lock()
            .map_err(|_| anyhow!("digest summary lock poisoned"))?;
        Ok(guard.clone())
    }
}

impl VideoSink for DigestSink {
    fn write(&mut self, frame: &SequencedFrame) -> Result<()> {
        check_dimensions(frame, &self.info)?;
        let digest = frame.frame.digest();
        let mut summary = self
            .summary
            .lock()
            .map_err(|_| anyhow!("digest summary lock poisoned"))?;
        if summary.finished {
            return Err(anyhow!("stub://{} already finished", self.name));
        }
        summary.chain = chain_digest(&summary.chain, &digest);
        summary.frames += 1;
        summary.last_index = Some(frame.index);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut summary = self
            .summary
            .lock()
            .map_err(|_| anyhow!("digest summary lock poisoned"))?;
        summary.finished = true;
        log::info!(
            "DigestSink: stub://{} closed after {} frames, chain={}",
            self.name,
            summary.frames,
            summary.chain_hex()
        );
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.summary.lock().map(|s| s.frames).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn info() -> StreamInfo {
        StreamInfo {
            width: 2,
            height: 1,
            fps: 10.0,
            codec: "rawvideo".to_string(),
        }
    }

    fn frame(index: u64, shade: u8) -> SequencedFrame {
        SequencedFrame::new(index, Frame::filled(2, 1, [shade, shade, shade]).unwrap())
    }

    #[test]
    fn chain_depends_on_order() {
        let mut forward = DigestSink::new("a", &info());
        forward.write(&frame(0, 1)).unwrap();
        forward.write(&frame(1, 2)).unwrap();

        let mut reversed = DigestSink::new("b", &info());
        reversed.write(&frame(0, 2)).unwrap();
        reversed.write(&frame(1, 1)).unwrap();

        let a = forward.summary().unwrap();
        let b = reversed.summary().unwrap();
        assert_eq!(a.frames, 2);
        assert_eq!(a.last_index, Some(1));
        assert_ne!(a.chain, b.chain);
    }

    #[test]
    fn chain_matches_manual_fold() {
        let mut sink = DigestSink::new("a", &info());
        let f = frame(0, 9);
        let expected = chain_digest(&[0u8; 32], &f.frame.digest());
        sink.write(&f).unwrap();
        assert_eq!(sink.summary().unwrap().chain, expected);
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let mut sink = DigestSink::new("a", &info());
        let wrong = SequencedFrame::new(0, Frame::filled(1, 1, [0, 0, 0]).unwrap());
        assert!(sink.write(&wrong).is_err());
        assert_eq!(sink.frames_written(), 0);
    }

    #[test]
    fn write_after_finish_fails() {
        let mut sink = DigestSink::new("a", &info());
        let handle = sink.summary_handle();
        sink.finish().unwrap();
        assert!(sink.write(&frame(0, 1)).is_err());
        assert!(handle.lock().unwrap().finished);
    }
}

//! Synthetic frame source.
//!
//! `stub://<name>?frames=N&width=W&height=H&fps=F&fail_at=K`
//!
//! Produces `frames` deterministic RGB24 frames and then reports exhaustion.
//! With `fail_at=K` the read of frame `K` (zero-based) fails instead, which
//! exercises the truncated-stream path.

use anyhow::{anyhow, Result};

use super::VideoSource;
use crate::frame::{rgb_len, Frame, StreamInfo};
use crate::uri::StubUri;

const DEFAULT_FRAMES: u64 = 100;
const DEFAULT_WIDTH: u32 = 64;
const DEFAULT_HEIGHT: u32 = 48;
const DEFAULT_FPS: f64 = 10.0;
const SCENE_CHANGE_EVERY: u64 = 50;
/// Largest frame a stub source will generate (8K RGB24 fits).
const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub frames: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Zero-based frame whose read fails, if any.
    pub fail_at: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            frames: DEFAULT_FRAMES,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            fail_at: None,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_len: usize,
    frame_count: u64,
    /// Simulated scene state; bumps periodically so motion detectors fire.
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "synthetic source needs non-zero dimensions, got {}x{}",
                config.width,
                config.height
            ));
        }
        let frame_len = rgb_len(config.width, config.height)
            .ok()
            .filter(|len| *len <= MAX_FRAME_BYTES)
            .ok_or_else(|| {
                anyhow!(
                    "synthetic frames of {}x{} exceed {} bytes",
                    config.width,
                    config.height,
                    MAX_FRAME_BYTES
                )
            })?;
        log::info!(
            "SyntheticSource: opened stub://{} ({} frames, {}x{})",
            config.name,
            config.frames,
            config.width,
            config.height
        );
        Ok(Self {
            config,
            frame_len,
            frame_count: 0,
            scene_state: 0,
        })
    }

    pub fn from_stub(stub: &StubUri) -> Result<Self> {
        let fail_at = match stub.params.get("fail_at") {
            Some(_) => Some(stub.param_or("fail_at", 0u64)?),
            None => None,
        };
        Self::new(SyntheticConfig {
            name: stub.name.clone(),
            frames: stub.param_or("frames", DEFAULT_FRAMES)?,
            width: stub.param_or("width", DEFAULT_WIDTH)?,
            height: stub.param_or("height", DEFAULT_HEIGHT)?,
            fps: stub.param_or("fps", DEFAULT_FPS)?,
            fail_at,
        })
    }

    /// Pixels of frame `k`: a diagonal ramp shifted by the frame number.
    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        if self.frame_count > 0 && self.frame_count % SCENE_CHANGE_EVERY == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; self.frame_len];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64 * 97) % 256) as u8;
        }
        pixels
    }
}

impl VideoSource for SyntheticSource {
    fn info(&self) -> StreamInfo {
        StreamInfo {
            width: self.config.width,
            height: self.config.height,
            fps: self.config.fps,
            codec: "rawvideo".to_string(),
        }
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.config.fail_at == Some(self.frame_count) {
            return Err(anyhow!(
                "stub://{} read failure injected at frame {}",
                self.config.name,
                self.frame_count
            ));
        }
        if self.frame_count >= self.config.frames {
            return Ok(None);
        }
        let pixels = self.generate_synthetic_pixels();
        let frame = Frame::from_rgb(pixels, self.config.width, self.config.height)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn frames_read(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri::Location;

    fn stub(raw: &str) -> StubUri {
        match Location::parse(raw).unwrap() {
            Location::Stub(stub) => stub,
            Location::Path(_) => panic!("expected stub"),
        }
    }

    #[test]
    fn yields_configured_frame_count_then_exhausts() {
        let mut source =
            SyntheticSource::from_stub(&stub("stub://t?frames=3&width=4&height=2")).unwrap();
        let info = source.info();
        assert_eq!((info.width, info.height), (4, 2));

        for _ in 0..3 {
            let frame = source.read_next().unwrap().expect("frame");
            assert_eq!(frame.byte_len(), 4 * 2 * 3);
        }
        assert!(source.read_next().unwrap().is_none());
        assert!(source.read_next().unwrap().is_none());
        assert_eq!(source.frames_read(), 3);
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut source = SyntheticSource::from_stub(&stub("stub://t?frames=2")).unwrap();
        let a = source.read_next().unwrap().unwrap();
        let b = source.read_next().unwrap().unwrap();
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn same_config_is_deterministic() {
        let mut a = SyntheticSource::from_stub(&stub("stub://a?frames=60")).unwrap();
        let mut b = SyntheticSource::from_stub(&stub("stub://b?frames=60")).unwrap();
        while let Some(frame) = a.read_next().unwrap() {
            assert_eq!(frame.digest(), b.read_next().unwrap().unwrap().digest());
        }
    }

    #[test]
    fn injected_failure_surfaces_as_error() {
        let mut source = SyntheticSource::from_stub(&stub("stub://t?frames=5&fail_at=2")).unwrap();
        assert!(source.read_next().unwrap().is_some());
        assert!(source.read_next().unwrap().is_some());
        assert!(source.read_next().is_err());
        assert_eq!(source.frames_read(), 2);
    }

    #[test]
    fn zero_frames_is_an_empty_stream() {
        let mut source = SyntheticSource::from_stub(&stub("stub://t?frames=0")).unwrap();
        assert!(source.read_next().unwrap().is_none());
    }

    #[test]
    fn zero_dimensions_fail_to_open() {
        assert!(SyntheticSource::from_stub(&stub("stub://t?width=0")).is_err());
    }

    #[test]
    fn oversized_dimensions_fail_to_open() {
        let huge = format!("stub://t?width={}&height={}", u32::MAX, u32::MAX);
        assert!(SyntheticSource::from_stub(&stub(&huge)).is_err());

        let err = SyntheticSource::from_stub(&stub("stub://t?width=100000&height=100000"))
            .err()
            .expect("too large to allocate per frame");
        assert!(err.to_string().contains("exceed"));
    }

    #[test]
    fn largest_common_resolution_is_accepted() {
        let source =
            SyntheticSource::from_stub(&stub("stub://t?frames=0&width=7680&height=4320")).unwrap();
        assert_eq!(source.info().width, 7680);
    }
}

//! Frame ownership layer.
//!
//! - `Frame`: owned RGB24 pixel buffer. Not `Clone`; moves between stages.
//! - `SequencedFrame`: a frame tagged with the index the transform stage gave it.
//! - `StreamInfo`: stream metadata a source exposes so the sink can be opened.
//!
//! A frame in flight is owned by exactly one stage or one queue slot. There is
//! no shared handle to pixel data, so no lock is ever taken around frame contents.
//!
//! Cloning is deliberately unavailable:
//!
//! ```compile_fail
//! use framepipe::Frame;
//!
//! let frame = Frame::from_rgb(vec![0; 3], 1, 1).unwrap();
//! let _copy = frame.clone();
//! ```

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use std::fmt;

/// Bytes per RGB24 pixel.
pub const RGB_CHANNELS: usize = 3;

// ----------------------------------------------------------------------------
// Frame: owned decoded image
// ----------------------------------------------------------------------------

/// One decoded image, tightly packed RGB24 (no row padding).
///
/// Explicitly NOT implementing `Clone`. A source that reuses its own decode
/// buffers copies out into a fresh `Frame` inside `read_next`, so every later
/// hand-off is a move.
#[derive(PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap tightly packed RGB24 pixels. Fails when the buffer length does not
    /// match `width * height * 3`.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// A frame filled with a single colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let len = rgb_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len / RGB_CHANNELS {
            data.extend_from_slice(&rgb);
        }
        Self::from_rgb(data, width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// RGB value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Set the pixel at `(x, y)`. Coordinates outside the frame are ignored.
    pub fn put_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
        self.data[idx..idx + RGB_CHANNELS].copy_from_slice(&rgb);
    }

    /// SHA-256 of the pixel bytes.
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(&self.data).into()
    }
}

// Pixel bytes are never written to logs.
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Byte length of a `width` x `height` RGB24 frame.
pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

// ----------------------------------------------------------------------------
// SequencedFrame: transform output
// ----------------------------------------------------------------------------

/// A frame bound to its sequence index.
///
/// Indices are assigned by the single transform stage in the order it drains
/// its input queue, so they are strictly increasing and gapless.
#[derive(Debug)]
pub struct SequencedFrame {
    pub index: u64,
    pub frame: Frame,
}

impl SequencedFrame {
    pub fn new(index: u64, frame: Frame) -> Self {
        Self { index, frame }
    }
}

// ----------------------------------------------------------------------------
// StreamInfo: source metadata for opening the sink
// ----------------------------------------------------------------------------

/// Stream properties a source reports and a sink is opened with.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second.
    pub fps: f64,
    /// Encoding identifier, e.g. `h264` or `rawvideo`.
    pub codec: String,
}

impl StreamInfo {
    /// Frame rate rounded to a whole number, at least 1.
    pub fn fps_rounded(&self) -> u32 {
        if self.fps.is_finite() && self.fps >= 1.0 {
            self.fps.round() as u32
        } else {
            1
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_rejects_wrong_length() {
        assert!(Frame::from_rgb(vec![0; 11], 2, 2).is_err());
        assert!(Frame::from_rgb(vec![0; 12], 2, 2).is_ok());
    }

    #[test]
    fn filled_frame_has_uniform_colour() {
        let frame = Frame::filled(3, 2, [10, 20, 30]).unwrap();
        assert_eq!(frame.byte_len(), 18);
        assert_eq!(frame.pixel(2, 1), Some([10, 20, 30]));
        assert_eq!(frame.pixel(3, 0), None);
    }

    #[test]
    fn put_pixel_ignores_out_of_bounds() {
        let mut frame = Frame::filled(2, 2, [0, 0, 0]).unwrap();
        frame.put_pixel(-1, 0, [255, 0, 0]);
        frame.put_pixel(2, 1, [255, 0, 0]);
        frame.put_pixel(1, 1, [255, 0, 0]);
        assert_eq!(frame.pixel(1, 1), Some([255, 0, 0]));
        assert_eq!(frame.pixels().iter().filter(|&&b| b == 255).count(), 1);
    }

    #[test]
    fn digest_tracks_content() {
        let a = Frame::filled(2, 2, [1, 2, 3]).unwrap();
        let b = Frame::filled(2, 2, [1, 2, 3]).unwrap();
        let c = Frame::filled(2, 2, [3, 2, 1]).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn debug_does_not_dump_pixels() {
        let frame = Frame::filled(1, 1, [7, 7, 7]).unwrap();
        let rendered = format!("{:?}", frame);
        assert!(rendered.contains("bytes: 3"));
        assert!(!rendered.contains("[7, 7, 7]"));
    }

    #[test]
    fn fps_rounding_never_returns_zero() {
        let mut info = StreamInfo {
            width: 1,
            height: 1,
            fps: 29.97,
            codec: "h264".to_string(),
        };
        assert_eq!(info.fps_rounded(), 30);
        info.fps = 0.0;
        assert_eq!(info.fps_rounded(), 1);
        info.fps = f64::NAN;
        assert_eq!(info.fps_rounded(), 1);
    }
}

use anyhow::Result;

use crate::detect::backend::FrameTransformer;
use crate::detect::result::{BoundingBox, Detection, Region};
use crate::frame::Frame;

pub const MOTION_CLASS_ID: u32 = 0;
pub const MOTION_CONFIDENCE: f32 = 0.85;

/// Frame-difference motion detector.
///
/// Compares each frame's digest with the previous one. A change yields one
/// whole-frame detection; the first frame and repeated frames yield none.
#[derive(Default)]
pub struct MotionTransformer {
    last_hash: Option<[u8; 32]>,
}

impl MotionTransformer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameTransformer for MotionTransformer {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let current_hash = frame.digest();

        let motion = self.last_hash.is_some_and(|prev| prev != current_hash);

        self.last_hash = Some(current_hash);

        if !motion {
            return Ok(Vec::new());
        }
        Ok(vec![Detection::new(
            MOTION_CLASS_ID,
            "motion",
            MOTION_CONFIDENCE,
            Region::Axis(BoundingBox {
                x: 0.0,
                y: 0.0,
                w: frame.width().saturating_sub(1) as f32,
                h: frame.height().saturating_sub(1) as f32,
            }),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::annotate::class_colour;

    #[test]
    fn motion_backend_detects_changes() {
        let mut backend = MotionTransformer::new();
        let frame1 = Frame::filled(8, 8, [1, 1, 1]).unwrap();
        let frame2 = Frame::filled(8, 8, [2, 2, 2]).unwrap();
        let frame2_again = Frame::filled(8, 8, [2, 2, 2]).unwrap();

        assert!(backend.infer(&frame1).unwrap().is_empty());

        let r2 = backend.infer(&frame2).unwrap();
        assert_eq!(r2.len(), 1);
        assert_eq!(r2[0].label, "motion");
        assert_eq!(r2[0].confidence, MOTION_CONFIDENCE);

        assert!(backend.infer(&frame2_again).unwrap().is_empty());
    }

    #[test]
    fn annotate_outlines_the_frame_border() {
        let mut backend = MotionTransformer::new();
        backend
            .infer(&Frame::filled(8, 8, [0, 0, 0]).unwrap())
            .unwrap();
        let frame = Frame::filled(8, 8, [9, 9, 9]).unwrap();
        let detections = backend.infer(&frame).unwrap();

        let out = backend.annotate(frame, &detections).unwrap();
        assert_eq!(out.pixel(0, 0), Some(class_colour(MOTION_CLASS_ID)));
        assert_eq!(out.pixel(7, 7), Some(class_colour(MOTION_CLASS_ID)));
        assert_eq!(out.pixel(4, 4), Some([9, 9, 9]));
    }
}

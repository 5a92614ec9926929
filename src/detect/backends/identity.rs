use anyhow::Result;

use crate::detect::backend::FrameTransformer;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Passes frames through untouched.
#[derive(Debug, Default)]
pub struct IdentityTransformer;

impl IdentityTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl FrameTransformer for IdentityTransformer {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn infer(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }

    fn annotate(&mut self, frame: Frame, _detections: &[Detection]) -> Result<Frame> {
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_frame_unchanged() {
        let mut transformer = IdentityTransformer::new();
        let frame = Frame::filled(3, 3, [5, 6, 7]).unwrap();
        let digest = frame.digest();

        let detections = transformer.infer(&frame).unwrap();
        assert!(detections.is_empty());
        let out = transformer.annotate(frame, &detections).unwrap();
        assert_eq!(out.digest(), digest);
    }
}

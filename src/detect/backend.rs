use anyhow::Result;

use crate::detect::annotate::draw_detections;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Per-frame transformation run by the transform stage.
///
/// A transformer sees frames one at a time, in capture order, from a single
/// thread. It may keep state between frames (the motion backend remembers the
/// previous frame's digest).
pub trait FrameTransformer: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Find detections in a frame. The frame is read-only here.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Produce the output frame from the input frame and its detections.
    ///
    /// The default draws each detection's outline in place.
    fn annotate(&mut self, mut frame: Frame, detections: &[Detection]) -> Result<Frame> {
        draw_detections(&mut frame, detections);
        Ok(frame)
    }

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: FrameTransformer + ?Sized> FrameTransformer for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).infer(frame)
    }

    fn annotate(&mut self, frame: Frame, detections: &[Detection]) -> Result<Frame> {
        (**self).annotate(frame, detections)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}

//! The three stage loops.
//!
//! Each stage owns one end of each queue it touches and returns a
//! `StageReport`. Queue hand-off is the only coordination:
//! - a stage always finishes its downstream queue when it exits, even on panic
//! - a stage that stops before draining its upstream aborts that queue, so the
//!   producer behind it stops at its next enqueue instead of running on

use anyhow::Error;

use super::report::{StageKind, StageOutcome, StageReport};
use super::TransformErrorPolicy;
use crate::cancel::CancelToken;
use crate::detect::FrameTransformer;
use crate::error::{chain, PipelineError};
use crate::frame::{Frame, SequencedFrame};
use crate::ingest::VideoSource;
use crate::queue::HandoffQueue;
use crate::sink::VideoSink;

const PROGRESS_EVERY: u64 = 100;

/// Marks a queue finished when dropped.
struct FinishOnDrop<'a, T>(&'a HandoffQueue<T>);

impl<T> Drop for FinishOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.mark_finished();
    }
}

/// Aborts a queue when dropped, unless disarmed after a clean drain.
struct AbortOnDrop<'a, T> {
    queue: &'a HandoffQueue<T>,
    armed: bool,
}

impl<'a, T> AbortOnDrop<'a, T> {
    fn armed(queue: &'a HandoffQueue<T>) -> Self {
        Self { queue, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<T> Drop for AbortOnDrop<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            let dropped = self.queue.abort();
            if dropped > 0 {
                log::debug!("aborted upstream queue, dropped {} queued items", dropped);
            }
        }
    }
}

/// End-of-stream outcome for a consumer whose `dequeue` returned `None`.
fn end_of_stream<T>(input: &HandoffQueue<T>, cancel: &CancelToken) -> StageOutcome {
    if input.is_aborted() || cancel.is_cancelled() {
        StageOutcome::Cancelled
    } else {
        StageOutcome::Completed
    }
}

/// Pull frames from `source` into `output` until the source runs dry.
pub(crate) fn capture(
    source: &mut dyn VideoSource,
    output: &HandoffQueue<Frame>,
    cancel: &CancelToken,
) -> StageReport {
    let _finish = FinishOnDrop(output);
    let mut report = StageReport::new(StageKind::Capture);
    log::info!("capture: started");

    let outcome = loop {
        if cancel.is_cancelled() {
            break StageOutcome::Cancelled;
        }
        match source.read_next() {
            Ok(Some(frame)) => {
                if output.enqueue(frame).is_err() {
                    log::debug!("capture: downstream closed, stopping");
                    break StageOutcome::Cancelled;
                }
                report.frames += 1;
                log::trace!("capture: queued frame {}", report.frames);
            }
            Ok(None) => break StageOutcome::Completed,
            Err(err) => {
                let err = PipelineError::SourceRead {
                    frame: report.frames,
                    reason: chain(&err),
                };
                log::warn!("capture: {}", err);
                break StageOutcome::Truncated(err);
            }
        }
    };

    log::info!("capture: {} after {} frames", outcome, report.frames);
    report.with_outcome(outcome)
}

/// Why a frame could not be transformed, and the frame itself if it survived.
struct TransformFailure {
    error: Error,
    frame: Option<Frame>,
}

fn transform_frame(
    transformer: &mut dyn FrameTransformer,
    frame: Frame,
) -> Result<Frame, TransformFailure> {
    let detections = match transformer.infer(&frame) {
        Ok(detections) => detections,
        Err(error) => {
            return Err(TransformFailure {
                error,
                frame: Some(frame),
            })
        }
    };
    transformer
        .annotate(frame, &detections)
        .map_err(|error| TransformFailure { error, frame: None })
}

/// Transform frames from `input`, number them, and queue them on `output`.
pub(crate) fn transform(
    transformer: &mut dyn FrameTransformer,
    input: &HandoffQueue<Frame>,
    output: &HandoffQueue<SequencedFrame>,
    policy: TransformErrorPolicy,
    cancel: &CancelToken,
) -> StageReport {
    let _finish = FinishOnDrop(output);
    let mut upstream = AbortOnDrop::armed(input);
    let mut report = StageReport::new(StageKind::Transform);
    let mut index: u64 = 0;
    let mut received: u64 = 0;
    log::info!(
        "transform: started ({}, on error: {})",
        transformer.name(),
        policy
    );

    let outcome = loop {
        let Some(frame) = input.dequeue() else {
            break end_of_stream(input, cancel);
        };
        if cancel.is_cancelled() {
            break StageOutcome::Cancelled;
        }
        received += 1;

        let frame = match transform_frame(transformer, frame) {
            Ok(frame) => frame,
            Err(failure) => {
                let reason = chain(&failure.error);
                match (policy, failure.frame) {
                    (TransformErrorPolicy::Abort, _) => {
                        let err = PipelineError::Transform { reason };
                        log::error!("transform: input frame {}: {}", received - 1, err);
                        break StageOutcome::Failed(err);
                    }
                    (TransformErrorPolicy::PassThrough, Some(frame)) => {
                        log::warn!(
                            "transform: input frame {} passed through unannotated: {}",
                            received - 1,
                            reason
                        );
                        report.passed_through += 1;
                        frame
                    }
                    (_, _) => {
                        log::warn!("transform: input frame {} skipped: {}", received - 1, reason);
                        report.skipped += 1;
                        continue;
                    }
                }
            }
        };

        if output.enqueue(SequencedFrame::new(index, frame)).is_err() {
            log::debug!("transform: downstream closed, stopping");
            break StageOutcome::Cancelled;
        }
        index += 1;
        report.frames += 1;
        if report.frames % PROGRESS_EVERY == 0 {
            log::debug!("transform: {} frames", report.frames);
        }
    };

    if outcome.is_completed() {
        upstream.disarm();
    }
    log::info!(
        "transform: {} after {} frames ({} skipped, {} passed through)",
        outcome,
        report.frames,
        report.skipped,
        report.passed_through
    );
    report.with_outcome(outcome)
}

/// Write sequenced frames from `input` to `sink` in arrival order.
pub(crate) fn output(
    sink: &mut dyn VideoSink,
    input: &HandoffQueue<SequencedFrame>,
    cancel: &CancelToken,
) -> StageReport {
    let mut upstream = AbortOnDrop::armed(input);
    let mut report = StageReport::new(StageKind::Output);
    let mut expected: u64 = 0;
    log::info!("output: started");

    let outcome = loop {
        let Some(item) = input.dequeue() else {
            break end_of_stream(input, cancel);
        };
        if cancel.is_cancelled() {
            break StageOutcome::Cancelled;
        }
        if item.index != expected {
            let err = PipelineError::SequenceGap {
                expected,
                found: item.index,
            };
            log::error!("output: {}", err);
            break StageOutcome::Failed(err);
        }
        if let Err(err) = sink.write(&item) {
            let err = PipelineError::SinkWrite {
                index: item.index,
                reason: chain(&err),
            };
            log::error!("output: {}", err);
            break StageOutcome::Failed(err);
        }
        expected += 1;
        report.frames += 1;
        if report.frames % PROGRESS_EVERY == 0 {
            log::debug!("output: {} frames written", report.frames);
        }
    };

    if outcome.is_completed() {
        upstream.disarm();
    }
    log::info!("output: {} after {} frames", outcome, report.frames);
    report.with_outcome(outcome)
}

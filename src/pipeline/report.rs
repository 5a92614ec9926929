use std::fmt;
use std::time::Duration;

use crate::error::PipelineError;

pub const EXIT_OK: i32 = 0;
pub const EXIT_SETUP: i32 = 1;
pub const EXIT_FAILED: i32 = 2;
pub const EXIT_TRUNCATED: i32 = 3;
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Capture,
    Transform,
    Output,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Capture => "capture",
            StageKind::Transform => "transform",
            StageKind::Output => "output",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage ended. Variants are listed from least to most severe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    /// Upstream exhausted and the stage drained everything it was given.
    Completed,
    /// The source failed mid-stream; everything read before the failure went
    /// through.
    Truncated(PipelineError),
    /// Stopped early because the run was cancelled or a neighbour aborted.
    Cancelled,
    Failed(PipelineError),
}

impl StageOutcome {
    pub fn severity(&self) -> u8 {
        match self {
            StageOutcome::Completed => 0,
            StageOutcome::Truncated(_) => 1,
            StageOutcome::Cancelled => 2,
            StageOutcome::Failed(_) => 3,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            StageOutcome::Completed => EXIT_OK,
            StageOutcome::Truncated(_) => EXIT_TRUNCATED,
            StageOutcome::Cancelled => EXIT_CANCELLED,
            StageOutcome::Failed(_) => EXIT_FAILED,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed)
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            StageOutcome::Truncated(err) | StageOutcome::Failed(err) => Some(err),
            StageOutcome::Completed | StageOutcome::Cancelled => None,
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Completed => f.write_str("completed"),
            StageOutcome::Truncated(err) => write!(f, "truncated ({})", err),
            StageOutcome::Cancelled => f.write_str("cancelled"),
            StageOutcome::Failed(err) => write!(f, "failed ({})", err),
        }
    }
}

/// Final status of one stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageReport {
    pub stage: StageKind,
    pub outcome: StageOutcome,
    /// Frames the stage handed downstream (capture, transform) or wrote (output).
    pub frames: u64,
    /// Frames dropped by the `skip` transform-error policy.
    pub skipped: u64,
    /// Frames forwarded unannotated by the `pass-through` policy.
    pub passed_through: u64,
}

impl StageReport {
    pub fn new(stage: StageKind) -> Self {
        Self {
            stage,
            outcome: StageOutcome::Completed,
            frames: 0,
            skipped: 0,
            passed_through: 0,
        }
    }

    pub(crate) fn with_outcome(mut self, outcome: StageOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// Aggregated result of one pipeline run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub capture: StageReport,
    pub transform: StageReport,
    pub output: StageReport,
    pub elapsed: Duration,
    /// Peak depth of the capture→transform queue.
    pub capture_queue_peak: usize,
    /// Peak depth of the transform→output queue.
    pub output_queue_peak: usize,
}

impl RunReport {
    pub fn stages(&self) -> [&StageReport; 3] {
        [&self.capture, &self.transform, &self.output]
    }

    /// The most severe stage outcome; ties go to the earliest stage.
    pub fn worst(&self) -> &StageOutcome {
        let mut worst = &self.capture.outcome;
        for report in [&self.transform, &self.output] {
            if report.outcome.severity() > worst.severity() {
                worst = &report.outcome;
            }
        }
        worst
    }

    pub fn is_success(&self) -> bool {
        self.stages().iter().all(|r| r.outcome.is_completed())
    }

    pub fn exit_code(&self) -> i32 {
        self.worst().exit_code()
    }

    pub fn frames_written(&self) -> u64 {
        self.output.frames
    }

    pub fn summary(&self) -> String {
        format!(
            "captured={} transformed={} skipped={} written={} peak_queue=({}, {}) elapsed={:.2}s status={}",
            self.capture.frames,
            self.transform.frames,
            self.transform.skipped,
            self.output.frames,
            self.capture_queue_peak,
            self.output_queue_peak,
            self.elapsed.as_secs_f64(),
            self.worst()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(capture: StageOutcome, transform: StageOutcome, output: StageOutcome) -> RunReport {
        RunReport {
            capture: StageReport::new(StageKind::Capture).with_outcome(capture),
            transform: StageReport::new(StageKind::Transform).with_outcome(transform),
            output: StageReport::new(StageKind::Output).with_outcome(output),
            elapsed: Duration::from_millis(5),
            capture_queue_peak: 0,
            output_queue_peak: 0,
        }
    }

    #[test]
    fn all_completed_exits_zero() {
        let r = report(
            StageOutcome::Completed,
            StageOutcome::Completed,
            StageOutcome::Completed,
        );
        assert!(r.is_success());
        assert_eq!(r.exit_code(), EXIT_OK);
    }

    #[test]
    fn failure_outranks_cancellation_and_truncation() {
        let failed = StageOutcome::Failed(PipelineError::SinkWrite {
            index: 3,
            reason: "disk full".to_string(),
        });
        let r = report(
            StageOutcome::Truncated(PipelineError::SourceRead {
                frame: 1,
                reason: "eof".to_string(),
            }),
            StageOutcome::Cancelled,
            failed.clone(),
        );
        assert_eq!(r.worst(), &failed);
        assert_eq!(r.exit_code(), EXIT_FAILED);
        assert!(!r.is_success());
    }

    #[test]
    fn truncated_source_has_its_own_exit_code() {
        let r = report(
            StageOutcome::Truncated(PipelineError::SourceRead {
                frame: 1,
                reason: "bad packet".to_string(),
            }),
            StageOutcome::Completed,
            StageOutcome::Completed,
        );
        assert_eq!(r.exit_code(), EXIT_TRUNCATED);
        assert!(r.summary().contains("truncated"));
    }

    #[test]
    fn cancelled_exit_code() {
        let r = report(
            StageOutcome::Cancelled,
            StageOutcome::Cancelled,
            StageOutcome::Completed,
        );
        assert_eq!(r.exit_code(), EXIT_CANCELLED);
    }
}

use thiserror::Error;

use crate::pipeline::StageKind;

/// Failures the pipeline itself distinguishes.
///
/// Collaborators (sources, sinks, transformers) report `anyhow::Error`; the
/// stages classify those into one of these variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("setup failed: {0}")]
    Setup(String),
    #[error("source read failed after {frame} frames: {reason}")]
    SourceRead { frame: u64, reason: String },
    #[error("sink write failed at index {index}: {reason}")]
    SinkWrite { index: u64, reason: String },
    #[error("sink finish failed: {0}")]
    SinkFinish(String),
    #[error("transform failed: {reason}")]
    Transform { reason: String },
    #[error("sequence gap: expected index {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },
    #[error("{0} stage panicked")]
    StagePanicked(StageKind),
}

impl PipelineError {
    pub fn setup(err: impl std::fmt::Display) -> Self {
        Self::Setup(err.to_string())
    }
}

/// Render an `anyhow::Error` with its context chain on one line.
pub(crate) fn chain(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

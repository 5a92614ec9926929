//! The three-stage pipeline: capture → transform → output.
//!
//! Stages run on their own named OS threads and hand frames to each other
//! through two `HandoffQueue`s:
//!
//! ```text
//! source ─▶ capture ─▶ [queue A: Frame] ─▶ transform ─▶ [queue B: SequencedFrame] ─▶ output ─▶ sink
//! ```
//!
//! Frames are moved, never copied. The transform stage assigns the
//! zero-based sequence index; output writes in arrival order, which is
//! index order.

mod report;
mod stages;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

use anyhow::Result;

use crate::cancel::{CancelRegistration, CancelToken};
use crate::config::PipelineConfig;
use crate::detect::{FrameTransformer, TransformerRegistry};
use crate::error::PipelineError;
use crate::frame::{Frame, SequencedFrame, StreamInfo};
use crate::ingest::{self, VideoSource};
use crate::queue::HandoffQueue;
use crate::sink::{self, SinkConfig, VideoSink};

pub use report::{
    RunReport, StageKind, StageOutcome, StageReport, EXIT_CANCELLED, EXIT_FAILED, EXIT_OK,
    EXIT_SETUP, EXIT_TRUNCATED,
};

/// What the transform stage does when `infer` or `annotate` fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransformErrorPolicy {
    /// Drop the frame and keep going. Dropped frames get no index.
    #[default]
    Skip,
    /// Forward the frame unannotated. Only possible when `infer` failed;
    /// a failed `annotate` has consumed the frame, so it is skipped.
    PassThrough,
    /// Stop the run.
    Abort,
}

impl TransformErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformErrorPolicy::Skip => "skip",
            TransformErrorPolicy::PassThrough => "pass-through",
            TransformErrorPolicy::Abort => "abort",
        }
    }
}

impl fmt::Display for TransformErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(TransformErrorPolicy::Skip),
            "pass-through" | "passthrough" | "pass_through" => {
                Ok(TransformErrorPolicy::PassThrough)
            }
            "abort" => Ok(TransformErrorPolicy::Abort),
            other => Err(format!(
                "unknown transform error policy '{}' (expected skip, pass-through or abort)",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PipelineOptions {
    pub on_transform_error: TransformErrorPolicy,
}

/// Runs one source through one transformer into one sink.
///
/// A `Pipeline` is reusable; every run builds fresh queues. Cancelling its
/// token stops the current run (and any later run immediately).
pub struct Pipeline {
    options: PipelineOptions,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_cancel_token(options, CancelToken::new())
    }

    pub fn with_cancel_token(options: PipelineOptions, cancel: CancelToken) -> Self {
        Self { options, cancel }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Open the source, then the sink for the source's stream, then run.
    ///
    /// Any failure while opening (or an unhealthy collaborator) is returned
    /// as `PipelineError::Setup` before a thread is started, a frame is read,
    /// or a frame is written. `open_sink` is not called if the source fails.
    pub fn launch<S, K, T, OS, OK>(
        &self,
        open_source: OS,
        open_sink: OK,
        transformer: T,
    ) -> Result<RunReport, PipelineError>
    where
        S: VideoSource,
        K: VideoSink,
        T: FrameTransformer,
        OS: FnOnce() -> Result<S>,
        OK: FnOnce(&StreamInfo) -> Result<K>,
    {
        let source = open_source()
            .map_err(|err| PipelineError::setup(format_args!("cannot open source: {:#}", err)))?;
        if !source.is_healthy() {
            return Err(PipelineError::setup("source is not healthy"));
        }
        let info = source.info();
        log::info!(
            "source opened: {}x{} @ {:.2} fps ({})",
            info.width,
            info.height,
            info.fps,
            info.codec
        );

        let sink = open_sink(&info)
            .map_err(|err| PipelineError::setup(format_args!("cannot open sink: {:#}", err)))?;
        if !sink.is_healthy() {
            return Err(PipelineError::setup("sink is not healthy"));
        }

        Ok(self.run(source, sink, transformer))
    }

    /// Run already-opened collaborators to completion.
    ///
    /// Returns once all three stages have stopped and the sink has been
    /// finished. Source and sink are dropped before returning.
    pub fn run<S, K, T>(&self, mut source: S, mut sink: K, mut transformer: T) -> RunReport
    where
        S: VideoSource,
        K: VideoSink,
        T: FrameTransformer,
    {
        let started = Instant::now();
        let capture_queue: Arc<HandoffQueue<Frame>> = Arc::new(HandoffQueue::new());
        let output_queue: Arc<HandoffQueue<SequencedFrame>> = Arc::new(HandoffQueue::new());
        let _abort_capture = abort_on_cancel(&self.cancel, &capture_queue);
        let _abort_output = abort_on_cancel(&self.cancel, &output_queue);

        let policy = self.options.on_transform_error;
        let cancel = &self.cancel;
        let (a, b) = (capture_queue.as_ref(), output_queue.as_ref());

        let (capture, transform, output) = thread::scope(|scope| {
            let capture = thread::Builder::new()
                .name(StageKind::Capture.to_string())
                .spawn_scoped(scope, || stages::capture(&mut source, a, cancel));
            let transform = thread::Builder::new()
                .name(StageKind::Transform.to_string())
                .spawn_scoped(scope, || {
                    stages::transform(&mut transformer, a, b, policy, cancel)
                });
            let output = thread::Builder::new()
                .name(StageKind::Output.to_string())
                .spawn_scoped(scope, || stages::output(&mut sink, b, cancel));

            if capture.is_err() || transform.is_err() || output.is_err() {
                // A missing stage would leave its neighbours blocked forever.
                a.abort();
                b.abort();
            }

            (
                join_stage(StageKind::Capture, capture),
                join_stage(StageKind::Transform, transform),
                join_stage(StageKind::Output, output),
            )
        });

        let mut output = output;
        if let Err(err) = sink.finish() {
            let err = PipelineError::SinkFinish(format!("{:#}", err));
            log::error!("{}", err);
            if !matches!(output.outcome, StageOutcome::Failed(_)) {
                output.outcome = StageOutcome::Failed(err);
            }
        }
        log::debug!(
            "source read {} frames, sink wrote {} frames",
            source.frames_read(),
            sink.frames_written()
        );
        drop(source);
        drop(sink);

        let report = RunReport {
            capture,
            transform,
            output,
            elapsed: started.elapsed(),
            capture_queue_peak: capture_queue.high_water_mark(),
            output_queue_peak: output_queue.high_water_mark(),
        };
        log::info!("pipeline finished: {}", report.summary());
        report
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

/// Build everything `config` names and run it.
pub fn run_config(
    config: &PipelineConfig,
    registry: &TransformerRegistry,
    cancel: CancelToken,
) -> Result<RunReport, PipelineError> {
    run_config_with(config, registry, cancel, sink::open_sink)
}

/// Like `run_config`, with the caller opening the sink from the configured
/// `SinkConfig`.
pub fn run_config_with<K, F>(
    config: &PipelineConfig,
    registry: &TransformerRegistry,
    cancel: CancelToken,
    open_sink: F,
) -> Result<RunReport, PipelineError>
where
    K: VideoSink,
    F: FnOnce(&SinkConfig, &StreamInfo) -> Result<K>,
{
    let transformer = registry
        .build(&config.transform)
        .map_err(|err| PipelineError::setup(format_args!("{:#}", err)))?;
    let sink_config = SinkConfig {
        uri: config.output.clone(),
        codec: config.codec.clone(),
    };
    let pipeline = Pipeline::with_cancel_token(
        PipelineOptions {
            on_transform_error: config.on_transform_error,
        },
        cancel,
    );
    pipeline.launch(
        || ingest::open_source(&config.input),
        |info| open_sink(&sink_config, info),
        transformer,
    )
}

/// Register `queue.abort()` with the token without keeping the queue alive.
/// Abort `queue` on cancellation for as long as the registration lives.
fn abort_on_cancel<T: Send + 'static>(
    cancel: &CancelToken,
    queue: &Arc<HandoffQueue<T>>,
) -> CancelRegistration {
    let weak: Weak<HandoffQueue<T>> = Arc::downgrade(queue);
    cancel.register(move || {
        if let Some(queue) = weak.upgrade() {
            queue.abort();
        }
    })
}

fn join_stage(
    stage: StageKind,
    handle: std::io::Result<ScopedJoinHandle<'_, StageReport>>,
) -> StageReport {
    match handle {
        Ok(handle) => handle.join().unwrap_or_else(|_| {
            log::error!("{} stage panicked", stage);
            StageReport::new(stage).with_outcome(StageOutcome::Failed(
                PipelineError::StagePanicked(stage),
            ))
        }),
        Err(err) => {
            log::error!("failed to spawn {} thread: {}", stage, err);
            StageReport::new(stage).with_outcome(StageOutcome::Failed(PipelineError::setup(
                format_args!("failed to spawn {} thread: {}", stage, err),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_known_names() {
        assert_eq!("skip".parse(), Ok(TransformErrorPolicy::Skip));
        assert_eq!("Pass-Through".parse(), Ok(TransformErrorPolicy::PassThrough));
        assert_eq!("passthrough".parse(), Ok(TransformErrorPolicy::PassThrough));
        assert_eq!(" abort ".parse(), Ok(TransformErrorPolicy::Abort));
        assert!("retry".parse::<TransformErrorPolicy>().is_err());
    }

    #[test]
    fn policy_display_round_trips() {
        for policy in [
            TransformErrorPolicy::Skip,
            TransformErrorPolicy::PassThrough,
            TransformErrorPolicy::Abort,
        ] {
            assert_eq!(policy.to_string().parse(), Ok(policy));
        }
    }

    #[test]
    fn default_policy_is_skip() {
        assert_eq!(TransformErrorPolicy::default(), TransformErrorPolicy::Skip);
    }
}

//! framepipe: a three-stage video frame pipeline.
//!
//! # Architecture
//!
//! A run wires three stages, each on its own OS thread:
//!
//! 1. **Capture** reads frames from a `VideoSource` into queue A.
//! 2. **Transform** runs a `FrameTransformer` (detect, then annotate), numbers
//!    each frame, and moves it into queue B.
//! 3. **Output** writes the numbered frames to a `VideoSink` in order.
//!
//! Queues are `HandoffQueue`s: unbounded FIFOs with a finished latch that
//! tells the consumer the producer is done, plus an abort used for failure
//! and cancellation. Frames are moved through the pipeline, never shared.
//!
//! # Module Structure
//!
//! - `frame`: owned frames, sequenced frames, stream metadata
//! - `queue`: the hand-off queue
//! - `pipeline`: stages, orchestrator, run reports
//! - `ingest`: sources (synthetic `stub://`, local files)
//! - `sink`: sinks (digest, raw RGB, encoded files)
//! - `detect`: transformers, detections, annotation
//! - `config`: file and environment configuration

pub mod cancel;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod queue;
pub mod sink;
pub mod uri;

pub use cancel::{CancelRegistration, CancelToken};
pub use config::{ConfigOverrides, PipelineConfig};
pub use detect::{Detection, FrameTransformer, Region, TransformerRegistry};
pub use error::PipelineError;
pub use frame::{Frame, SequencedFrame, StreamInfo};
pub use ingest::{open_source, VideoSource};
pub use pipeline::{
    Pipeline, PipelineOptions, RunReport, StageKind, StageOutcome, StageReport,
    TransformErrorPolicy,
};
pub use queue::{HandoffQueue, Rejected};
pub use sink::{open_sink, SinkConfig, VideoSink};

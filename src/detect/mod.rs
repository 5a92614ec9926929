//! Frame transformation: detection plus annotation.
//!
//! The transform stage drives a `FrameTransformer`. Built-in backends are
//! selected by name through `TransformerRegistry`.

pub mod annotate;
mod backend;
mod backends;
mod registry;
mod result;

pub use backend::FrameTransformer;
pub use backends::{IdentityTransformer, MotionTransformer};
pub use registry::TransformerRegistry;
pub use result::{BoundingBox, Detection, OrientedBox, Region};

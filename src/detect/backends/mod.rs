pub mod identity;
pub mod motion;

pub use identity::IdentityTransformer;
pub use motion::MotionTransformer;

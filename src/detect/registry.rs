use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use super::backend::FrameTransformer;
use super::backends::{IdentityTransformer, MotionTransformer};

type Factory = Box<dyn Fn() -> Result<Box<dyn FrameTransformer>> + Send + Sync>;

/// Named transformer factories.
///
/// Each pipeline run builds a fresh transformer, so per-stream state (such as
/// the motion backend's previous digest) never leaks between runs.
pub struct TransformerRegistry {
    factories: BTreeMap<String, Factory>,
    default_name: Option<String>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Registry holding `identity` (the default) and `motion`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("identity", || -> Result<Box<dyn FrameTransformer>> {
            Ok(Box::new(IdentityTransformer::new()))
        });
        registry.register("motion", || -> Result<Box<dyn FrameTransformer>> {
            Ok(Box::new(MotionTransformer::new()))
        });
        registry
    }

    /// Register a factory. The first registered name becomes the default.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Result<Box<dyn FrameTransformer>> + Send + Sync + 'static,
    {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Build a fresh transformer by name.
    pub fn build(&self, name: &str) -> Result<Box<dyn FrameTransformer>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            anyhow!(
                "unknown transformer '{}' (available: {})",
                name,
                self.list().join(", ")
            )
        })?;
        let mut transformer = factory()?;
        transformer.warm_up()?;
        Ok(transformer)
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::pipeline::TransformErrorPolicy;

const DEFAULT_INPUT: &str = "stub://camera";
const DEFAULT_OUTPUT: &str = "stub://digest";
const DEFAULT_TRANSFORM: &str = "identity";

pub const CONFIG_ENV: &str = "FRAMEPIPE_CONFIG";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    input: Option<String>,
    output: Option<String>,
    codec: Option<String>,
    transform: Option<TransformConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TransformConfigFile {
    name: Option<String>,
    on_error: Option<String>,
}

/// Everything needed to run one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// `stub://` URI or local file path.
    pub input: String,
    /// `stub://` URI or local file path.
    pub output: String,
    /// Encoder override for file outputs.
    pub codec: Option<String>,
    /// Registered transformer name.
    pub transform: String,
    pub on_transform_error: TransformErrorPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT.to_string(),
            output: DEFAULT_OUTPUT.to_string(),
            codec: None,
            transform: DEFAULT_TRANSFORM.to_string(),
            on_transform_error: TransformErrorPolicy::default(),
        }
    }
}

/// Values that win over both the config file and the environment, such as
/// command-line flags. `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<String>,
    pub output: Option<String>,
    pub codec: Option<String>,
    pub transform: Option<String>,
    pub on_transform_error: Option<TransformErrorPolicy>,
}

impl ConfigOverrides {
    fn apply(&self, cfg: &mut PipelineConfig) {
        if let Some(input) = &self.input {
            cfg.input = input.clone();
        }
        if let Some(output) = &self.output {
            cfg.output = output.clone();
        }
        if let Some(codec) = &self.codec {
            cfg.codec = Some(codec.clone());
        }
        if let Some(transform) = &self.transform {
            cfg.transform = transform.clone();
        }
        if let Some(policy) = self.on_transform_error {
            cfg.on_transform_error = policy;
        }
    }
}

impl PipelineConfig {
    /// File named by `FRAMEPIPE_CONFIG` (if set), then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit config file instead of `FRAMEPIPE_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, &ConfigOverrides::default())
    }

    /// Config file, then environment, then `overrides`. Validation runs once,
    /// on the merged result.
    pub fn load_with(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        overrides.apply(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let on_transform_error = match file
            .transform
            .as_ref()
            .and_then(|transform| transform.on_error.as_deref())
        {
            Some(policy) => parse_policy(policy)?,
            None => defaults.on_transform_error,
        };
        Ok(Self {
            input: file.input.unwrap_or(defaults.input),
            output: file.output.unwrap_or(defaults.output),
            codec: file.codec.filter(|codec| !codec.trim().is_empty()),
            transform: file
                .transform
                .and_then(|transform| transform.name)
                .unwrap_or(defaults.transform),
            on_transform_error,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(input) = non_empty_env("FRAMEPIPE_INPUT") {
            self.input = input;
        }
        if let Some(output) = non_empty_env("FRAMEPIPE_OUTPUT") {
            self.output = output;
        }
        if let Some(codec) = non_empty_env("FRAMEPIPE_CODEC") {
            self.codec = Some(codec);
        }
        if let Some(transform) = non_empty_env("FRAMEPIPE_TRANSFORM") {
            self.transform = transform;
        }
        if let Some(policy) = non_empty_env("FRAMEPIPE_ON_TRANSFORM_ERROR") {
            self.on_transform_error = parse_policy(&policy)
                .map_err(|e| anyhow!("FRAMEPIPE_ON_TRANSFORM_ERROR: {}", e))?;
        }
        Ok(())
    }

    /// Reject configurations that cannot run. Called by every `load*` after
    /// all sources are merged.
    pub fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            return Err(anyhow!("input must not be empty"));
        }
        if self.output.trim().is_empty() {
            return Err(anyhow!("output must not be empty"));
        }
        if self.input.trim() == self.output.trim() {
            return Err(anyhow!(
                "input and output must differ (both are '{}')",
                self.input
            ));
        }
        if self.transform.trim().is_empty() {
            return Err(anyhow!("transform name must not be empty"));
        }
        Ok(())
    }
}

fn parse_policy(value: &str) -> Result<TransformErrorPolicy> {
    value.parse().map_err(|e: String| anyhow!(e))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.transform, "identity");
        assert_eq!(cfg.on_transform_error, TransformErrorPolicy::Skip);
    }

    #[test]
    fn same_input_and_output_is_rejected() {
        let cfg = PipelineConfig {
            input: "stub://a".to_string(),
            output: "stub://a".to_string(),
            ..PipelineConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn blank_output_is_rejected() {
        let cfg = PipelineConfig {
            output: "  ".to_string(),
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn file_fields_override_defaults() {
        let file: PipelineConfigFile = serde_json::from_str(
            r#"{ "input": "clip.mp4", "transform": { "on_error": "abort" } }"#,
        )
        .unwrap();
        let cfg = PipelineConfig::from_file(file).unwrap();
        assert_eq!(cfg.input, "clip.mp4");
        assert_eq!(cfg.output, DEFAULT_OUTPUT);
        assert_eq!(cfg.transform, DEFAULT_TRANSFORM);
        assert_eq!(cfg.on_transform_error, TransformErrorPolicy::Abort);
    }

    #[test]
    fn unknown_policy_in_file_is_an_error() {
        let file: PipelineConfigFile =
            serde_json::from_str(r#"{ "transform": { "on_error": "retry" } }"#).unwrap();
        assert!(PipelineConfig::from_file(file).is_err());
    }
}

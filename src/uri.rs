//! Input/output location parsing.
//!
//! A location is either a local path or a `stub://name?key=value&...` URI
//! naming a synthetic endpoint. Other URL schemes are refused.

use anyhow::{anyhow, Result};
use std::collections::HashMap;

pub const STUB_SCHEME: &str = "stub://";

/// A parsed `stub://` URI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StubUri {
    pub name: String,
    pub params: HashMap<String, String>,
}

impl StubUri {
    /// Parse a numeric parameter, falling back to `default` when absent.
    pub fn param_or<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.params.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|_| anyhow!("stub parameter '{}' has invalid value '{}'", key, raw)),
            None => Ok(default),
        }
    }
}

/// Where frames come from or go to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Stub(StubUri),
    Path(String),
}

impl Location {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(anyhow!("location must not be empty"));
        }
        if let Some(rest) = raw.strip_prefix(STUB_SCHEME) {
            return Ok(Self::Stub(parse_stub(rest)?));
        }
        if raw.contains("://") {
            return Err(anyhow!(
                "'{}' is not a local path (only stub:// URIs and local files are supported)",
                raw
            ));
        }
        Ok(Self::Path(raw.to_string()))
    }
}

fn parse_stub(rest: &str) -> Result<StubUri> {
    let (name, query) = match rest.split_once('?') {
        Some((name, query)) => (name, Some(query)),
        None => (rest, None),
    };
    let mut params = HashMap::new();
    if let Some(query) = query {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("stub parameter '{}' is missing '='", pair))?;
            params.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(StubUri {
        name: name.to_string(),
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stub_with_params() {
        let loc = Location::parse("stub://cam?frames=5&width=8").unwrap();
        let Location::Stub(stub) = loc else {
            panic!("expected stub location");
        };
        assert_eq!(stub.name, "cam");
        assert_eq!(stub.param_or("frames", 0u64).unwrap(), 5);
        assert_eq!(stub.param_or("height", 48u32).unwrap(), 48);
    }

    #[test]
    fn rejects_remote_urls_and_empty() {
        assert!(Location::parse("rtsp://camera/stream").is_err());
        assert!(Location::parse("   ").is_err());
        assert!(Location::parse("stub://cam?frames").is_err());
    }

    #[test]
    fn bad_numeric_param_is_an_error() {
        let Location::Stub(stub) = Location::parse("stub://cam?frames=many").unwrap() else {
            panic!("expected stub location");
        };
        assert!(stub.param_or("frames", 0u64).is_err());
    }

    #[test]
    fn plain_paths_are_local() {
        assert_eq!(
            Location::parse("videos/in.mp4").unwrap(),
            Location::Path("videos/in.mp4".to_string())
        );
    }
}

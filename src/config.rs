//! Configuration for Gaffer

use std::fs;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration shared by every transaction created through one context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GafferConfig {
    /// Tag embedded in every global transaction id minted by this process
    pub instance_id: String,
    /// Log errors at the point they are raised
    pub log_exceptions: bool,
    /// Timeout applied when `begin` is called without one (None = infinite)
    pub default_timeout_seconds: Option<u32>,
    /// Elapsed time after which validatable resources are probed before commit (negative = never)
    pub before_commit_validation_required_time_ms: i64,
}

impl Default for GafferConfig {
    fn default() -> Self {
        Self {
            instance_id: random_instance_id(),
            log_exceptions: true,
            default_timeout_seconds: None,
            before_commit_validation_required_time_ms: -1,
        }
    }
}

impl GafferConfig {
    pub fn with_instance_id(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    /// Config for pooled connections that may have gone stale: resources are
    /// re-validated when the transaction has been open for more than 30 seconds.
    pub fn validating() -> Self {
        Self {
            before_commit_validation_required_time_ms: 30_000,
            ..Self::default()
        }
    }

    /// Config that keeps error logging to the caller
    pub fn quiet() -> Self {
        Self {
            log_exceptions: false,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        log::debug!("Loading configuration from {:?}", path.as_ref());
        Self::from_json_str(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn random_instance_id() -> String {
    let tag: u32 = rand::thread_rng().gen();
    format!("gaffer-{:08x}", tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GafferConfig::default();
        assert!(config.instance_id.starts_with("gaffer-"));
        assert_eq!(config.instance_id.len(), "gaffer-".len() + 8);
        assert!(config.log_exceptions);
        assert_eq!(config.default_timeout_seconds, None);
        assert_eq!(config.before_commit_validation_required_time_ms, -1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GafferConfig::from_json_str(r#"{"instance_id": "node-1"}"#).unwrap();
        assert_eq!(config.instance_id, "node-1");
        assert!(config.log_exceptions);
        assert_eq!(config.before_commit_validation_required_time_ms, -1);
    }

    #[test]
    fn test_json_roundtrip_preserves_fields() {
        let mut config = GafferConfig::with_instance_id("node-2");
        config.default_timeout_seconds = Some(30);
        let parsed = GafferConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_presets() {
        assert_eq!(GafferConfig::validating().before_commit_validation_required_time_ms, 30_000);
        assert!(!GafferConfig::quiet().log_exceptions);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(GafferConfig::from_json_str("{ not json").is_err());
    }
}

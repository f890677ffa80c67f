//! Render engine configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default user agent presented by the render engine when a task does not
/// override it
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1) AppleWebKit/537.31 (KHTML, like Gecko) Snapfarm/0.1";

/// Selectable render engine backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Plain HTTP fetch engine (no JavaScript execution)
    #[default]
    Http,
}

/// Render engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine backend used by workers
    #[serde(default)]
    pub kind: EngineKind,

    /// User agent applied when a task does not carry one
    #[serde(default = "default_user_agent")]
    pub default_user_agent: String,

    /// Path to the worker executable the supervisor launches
    #[serde(default = "default_worker_binary")]
    pub worker_binary: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            default_user_agent: default_user_agent(),
            worker_binary: default_worker_binary(),
        }
    }
}

impl Validatable for EngineConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.default_user_agent, "default_user_agent", self.domain_name())?;
        if self.worker_binary.as_os_str().is_empty() {
            return Err(self.validation_error("worker_binary cannot be empty"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "engine"
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_worker_binary() -> PathBuf {
    PathBuf::from("snapfarm-worker")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.kind, EngineKind::Http);
        assert_eq!(config.default_user_agent, DEFAULT_USER_AGENT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_kind_wire_format() {
        let kind: EngineKind = serde_yaml::from_str("http").unwrap();
        assert_eq!(kind, EngineKind::Http);
    }
}

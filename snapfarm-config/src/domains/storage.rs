//! Snapshot storage configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory snapshots are written under; results carry paths
    /// relative to this directory
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

impl Validatable for StorageConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(self.validation_error("base_path cannot be empty"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "storage"
    }
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./storage")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.base_path, PathBuf::from("./storage"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_config_empty_path() {
        let config = StorageConfig {
            base_path: PathBuf::new(),
        };
        assert!(config.validate().is_err());
    }
}

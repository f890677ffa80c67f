//! Domain-specific configuration modules

pub mod control;
pub mod engine;
pub mod logging;
pub mod pool;
pub mod rpc;
pub mod storage;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Snapfarm configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SnapfarmConfig {
    /// Worker pool configuration
    #[serde(default)]
    pub pool: pool::PoolConfig,

    /// Control-plane listener configuration
    #[serde(default)]
    pub control: control::ControlConfig,

    /// RPC intake configuration
    #[serde(default)]
    pub rpc: rpc::RpcConfig,

    /// Snapshot storage configuration
    #[serde(default)]
    pub storage: storage::StorageConfig,

    /// Render engine configuration
    #[serde(default)]
    pub engine: engine::EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl SnapfarmConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.pool.validate()?;
        self.control.validate()?;
        self.rpc.validate()?;
        self.storage.validate()?;
        self.engine.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = SnapfarmConfig::default();
        serde_yaml::to_string(&config).unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

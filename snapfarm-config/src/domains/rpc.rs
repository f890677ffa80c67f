//! RPC intake configuration

use crate::error::ConfigResult;
use crate::validation::{validate_port_range, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};

/// RPC front-end configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Bind address for the RPC intake
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// RPC port
    #[serde(default = "default_rpc_port")]
    pub port: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_rpc_port(),
        }
    }
}

impl RpcConfig {
    /// Socket address string for binding
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Validatable for RpcConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.bind_address, "bind_address", self.domain_name())?;
        validate_port_range(self.port, "port", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "rpc"
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_rpc_port() -> u16 {
    5432
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_config_defaults() {
        let config = RpcConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:5432");
        assert!(config.validate().is_ok());
    }
}

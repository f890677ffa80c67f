//! Control-plane listener configuration

use crate::error::ConfigResult;
use crate::validation::{validate_port_range, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};

/// Control-plane listener configuration
///
/// Workers dial this address and hold one persistent duplex connection each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Bind address for the control-plane listener
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Control-plane port (passed to workers as a launch argument)
    #[serde(default = "default_control_port")]
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_control_port(),
        }
    }
}

impl ControlConfig {
    /// Socket address string for binding / dialing
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Validatable for ControlConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.bind_address, "bind_address", self.domain_name())?;
        validate_port_range(self.port, "port", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "control"
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_control_port() -> u16 {
    5433
}

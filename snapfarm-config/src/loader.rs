//! Configuration loading and environment variable handling

use crate::domains::SnapfarmConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "SNAPFARM".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<SnapfarmConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: SnapfarmConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<SnapfarmConfig> {
        let mut config = SnapfarmConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<SnapfarmConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut SnapfarmConfig) -> ConfigResult<()> {
        if let Ok(workers) = self.get_env_var("WORKERS") {
            config.pool.workers = workers
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid WORKERS: {}", e)))?;
        }

        if let Ok(max_tasks) = self.get_env_var("MAX_CONCURRENT_TASKS") {
            config.pool.max_concurrent_tasks = max_tasks
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid MAX_CONCURRENT_TASKS: {}", e)))?;
        }

        if let Ok(timeout) = self.get_env_var("TASK_TIMEOUT_SECONDS") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid TASK_TIMEOUT_SECONDS: {}", e)))?;
            config.pool.task_timeout = std::time::Duration::from_secs(seconds);
        }

        if let Ok(bind) = self.get_env_var("CONTROL_BIND") {
            config.control.bind_address = bind;
        }

        if let Ok(port) = self.get_env_var("CONTROL_PORT") {
            config.control.port = port
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid CONTROL_PORT: {}", e)))?;
        }

        if let Ok(bind) = self.get_env_var("RPC_BIND") {
            config.rpc.bind_address = bind;
        }

        if let Ok(port) = self.get_env_var("RPC_PORT") {
            config.rpc.port = port
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid RPC_PORT: {}", e)))?;
        }

        if let Ok(base) = self.get_env_var("STORAGE_BASE_PATH") {
            config.storage.base_path = base.into();
        }

        if let Ok(user_agent) = self.get_env_var("USER_AGENT") {
            config.engine.default_user_agent = user_agent;
        }

        if let Ok(binary) = self.get_env_var("WORKER_BINARY") {
            config.engine.worker_binary = binary.into();
        }

        if let Ok(level) = self.get_env_var("LOG_LEVEL") {
            use std::str::FromStr;
            config.logging.level = crate::domains::logging::LogLevel::from_str(&level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", level)))?;
        }

        if let Ok(log_format) = self.get_env_var("LOG_FORMAT") {
            use std::str::FromStr;
            config.logging.format = crate::domains::logging::LogFormat::from_str(&log_format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", log_format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "pool:\n  workers: 3\n  task_timeout: 7\ncontrol:\n  port: 9100\n"
        )
        .unwrap();

        let config = ConfigLoader::new().from_file(file.path()).unwrap();
        assert_eq!(config.pool.workers, 3);
        assert_eq!(config.pool.task_timeout, std::time::Duration::from_secs(7));
        assert_eq!(config.control.port, 9100);
        // Untouched domains keep their defaults
        assert_eq!(config.rpc.port, 5432);
    }

    #[test]
    fn test_env_override_uses_prefix() {
        // Unique prefix so parallel tests don't trample each other
        std::env::set_var("SNAPTEST_WORKERS", "2");
        let config = ConfigLoader::with_prefix("SNAPTEST").from_env().unwrap();
        assert_eq!(config.pool.workers, 2);
        std::env::remove_var("SNAPTEST_WORKERS");
    }

    #[test]
    fn test_env_override_log_format() {
        std::env::set_var("SNAPFMT_LOG_FORMAT", "json");
        let config = ConfigLoader::with_prefix("SNAPFMT").from_env().unwrap();
        assert_eq!(config.logging.format, crate::domains::logging::LogFormat::Json);
        std::env::remove_var("SNAPFMT_LOG_FORMAT");
    }

    #[test]
    fn test_invalid_file_config_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pool:\n  workers: 0\n").unwrap();

        assert!(ConfigLoader::new().from_file(file.path()).is_err());
    }
}

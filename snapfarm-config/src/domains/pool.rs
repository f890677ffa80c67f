//! Worker pool configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of renderer worker processes (fixed for the server's lifetime)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum concurrently executing tasks inside a single worker
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Per-task deadline, enforced independently by the dispatcher (round-trip)
    /// and by each worker (execution + backlog staleness)
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_task_timeout")]
    pub task_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            task_timeout: default_task_timeout(),
        }
    }
}

impl Validatable for PoolConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.workers, "workers", self.domain_name())?;
        validate_positive(self.max_concurrent_tasks, "max_concurrent_tasks", self.domain_name())?;
        validate_positive(self.task_timeout.as_secs(), "task_timeout", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "pool"
    }
}

// Default value functions
fn default_workers() -> usize {
    num_cpus::get()
}

fn default_max_concurrent_tasks() -> usize {
    5
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert!(config.workers > 0);
        assert_eq!(config.max_concurrent_tasks, 5);
        assert_eq!(config.task_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_pool_config_validation() {
        let mut config = PoolConfig::default();
        assert!(config.validate().is_ok());

        config.workers = 0;
        assert!(config.validate().is_err());

        config.workers = 4;
        config.task_timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }
}

//! Worker process error types

use thiserror::Error;

use crate::engine::EngineError;

/// Worker process errors
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Control connection error: {0}")]
    Connection(#[from] snapfarm_ipc::IpcError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

//! Error types for the dispatch engine

use thiserror::Error;

/// Dispatch engine errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Control plane error: {0}")]
    ControlPlane(String),

    #[error("Supervisor error: {0}")]
    Supervisor(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<snapfarm_ipc::IpcError> for DispatchError {
    fn from(err: snapfarm_ipc::IpcError) -> Self {
        Self::Ipc(err.to_string())
    }
}

//! Snapfarm master-side dispatch engine
//!
//! Owns task identity, idle-worker selection, result correlation and the
//! dispatch timeout; supervises the fixed pool of renderer worker
//! processes; and runs the control-plane listener the workers dial into.

pub mod control;
pub mod dispatcher;
pub mod error;
pub mod slots;
pub mod supervisor;

// Re-export main types
pub use control::ControlPlane;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use slots::{ConnectionHandle, DispatchContext};
pub use supervisor::{SupervisorConfig, WorkerPoolSupervisor};

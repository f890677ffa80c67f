//! Control-plane protocol and transport for Snapfarm
//!
//! This crate provides the message types and the newline-delimited JSON
//! transport used on the persistent duplex connection between the master
//! and each renderer worker process.

pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use error::IpcError;
pub use protocol::{
    ClipRect, Cookie, MasterBound, MessageEnvelope, PageSummary, SnapshotData, TaskKind,
    TaskReport, TaskRequest, TaskSpec, TaskStatus, ViewportSize, WorkerBound,
    CONTROL_PROTOCOL_VERSION,
};
pub use transport::{ControlChannel, MessageReader, MessageWriter};

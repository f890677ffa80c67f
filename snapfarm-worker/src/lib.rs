//! Snapfarm renderer worker
//!
//! One worker process per pool slot. The worker dials the master's control
//! port, admits incoming render tasks through a bounded FIFO queue and
//! executes them against the configured render engine, reporting each
//! outcome back over the same connection.

pub mod engine;
pub mod error;
pub mod queue;
pub mod runtime;
pub mod storage;

// Re-export main types
pub use engine::{EngineError, HttpEngine, RenderEngine};
pub use error::WorkerError;
pub use queue::{Admission, Completion, RunnableTask, TaskQueue};
pub use runtime::{run, RuntimeOptions};
pub use storage::{storage_paths, StoragePaths};

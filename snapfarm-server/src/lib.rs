//! Snapfarm server: RPC intake and component wiring
//!
//! Composes the dispatch engine, the control-plane listener, the worker
//! pool supervisor and the HTTP RPC front end into one process.

pub mod rpc;
pub mod startup;

pub use startup::App;

//! Worker slot table and shared dispatch context
//!
//! Slots are positional: slot ids 0..N-1 are fixed at startup and survive
//! process respawn. Each field of a slot has exactly one writer — the
//! control plane replaces `connection`, the dispatcher owns `idle` — and
//! every mutation happens under the context's single state lock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use snapfarm_ipc::TaskReport;

/// Sending side of one worker's control connection.
///
/// Holds pre-serialized envelope lines; the connection's writer task drains
/// them onto the socket. Sending after the connection died is a no-op.
pub struct ConnectionHandle {
    sender: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self { sender }
    }

    /// Queue a serialized envelope line; returns false if the connection
    /// is gone
    pub fn send_line(&self, line: String) -> bool {
        self.sender.send(line).is_ok()
    }

    /// Whether the connection's writer side has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// One worker slot
pub struct WorkerSlot {
    /// Live control connection, replaced wholesale on reconnect
    pub connection: Option<ConnectionHandle>,
    /// Worker-reported "local backlog empty"; optimistically cleared the
    /// moment a task is sent
    pub idle: bool,
}

impl WorkerSlot {
    fn new() -> Self {
        Self {
            connection: None,
            idle: true,
        }
    }
}

/// Mutable dispatcher state: the slot arena, the pending-waiter map and
/// the task id counter
pub(crate) struct DispatchState {
    pub(crate) slots: Vec<WorkerSlot>,
    pub(crate) pending: HashMap<u64, oneshot::Sender<TaskReport>>,
    pub(crate) next_task_id: u64,
}

/// Shared context injected into the dispatcher, the control plane and the
/// supervisor at construction
pub struct DispatchContext {
    pub(crate) state: Mutex<DispatchState>,
    pub(crate) task_timeout: Duration,
}

impl DispatchContext {
    /// Create a context with `pool_size` empty slots
    pub fn new(pool_size: usize, task_timeout: Duration) -> Self {
        let slots = (0..pool_size).map(|_| WorkerSlot::new()).collect();
        Self {
            state: Mutex::new(DispatchState {
                slots,
                pending: HashMap::new(),
                next_task_id: 0,
            }),
            task_timeout,
        }
    }

    /// Fixed pool size
    pub fn pool_size(&self) -> usize {
        self.state.lock().expect("dispatch state poisoned").slots.len()
    }

    /// Dispatch timeout applied to every task
    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    /// Register (or replace) the control connection for a slot.
    ///
    /// Returns whether an earlier connection was replaced, or `None` when
    /// the slot id is out of range. Idle flags and pending waiters are
    /// deliberately untouched so reconnection never disturbs in-flight
    /// dispatch state.
    pub fn register_connection(&self, worker_id: usize, handle: ConnectionHandle) -> Option<bool> {
        let mut state = self.state.lock().expect("dispatch state poisoned");
        let slot = state.slots.get_mut(worker_id)?;
        let replaced = slot.connection.is_some();
        slot.connection = Some(handle);
        Some(replaced)
    }

    /// Whether a slot currently holds a live control connection
    pub fn has_connection(&self, worker_id: usize) -> bool {
        let state = self.state.lock().expect("dispatch state poisoned");
        state
            .slots
            .get(worker_id)
            .and_then(|s| s.connection.as_ref())
            .is_some_and(|c| !c.is_closed())
    }

    /// Current idle flags, slot-ordered
    pub fn idle_flags(&self) -> Vec<bool> {
        let state = self.state.lock().expect("dispatch state poisoned");
        state.slots.iter().map(|s| s.idle).collect()
    }

    /// Number of unresolved waiters
    pub fn pending_count(&self) -> usize {
        self.state.lock().expect("dispatch state poisoned").pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_start_idle_and_unconnected() {
        let ctx = DispatchContext::new(3, Duration::from_secs(5));
        assert_eq!(ctx.pool_size(), 3);
        assert_eq!(ctx.idle_flags(), vec![true, true, true]);
        assert_eq!(ctx.pending_count(), 0);
    }

    #[test]
    fn test_register_replaces_in_place() {
        let ctx = DispatchContext::new(2, Duration::from_secs(5));
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(ctx.register_connection(1, ConnectionHandle::new(tx.clone())), Some(false));
        assert_eq!(ctx.register_connection(1, ConnectionHandle::new(tx)), Some(true));
        assert_eq!(ctx.pool_size(), 2);
    }

    #[test]
    fn test_register_out_of_range() {
        let ctx = DispatchContext::new(1, Duration::from_secs(5));
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(ctx.register_connection(7, ConnectionHandle::new(tx)), None);
    }
}

//! Task dispatch, worker selection and result correlation

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use snapfarm_ipc::{MessageEnvelope, TaskKind, TaskReport, TaskRequest, TaskSpec, WorkerBound};

use crate::slots::{DispatchContext, WorkerSlot};

/// Master-side task dispatcher.
///
/// Cheap to clone; all state lives in the shared [`DispatchContext`].
#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<DispatchContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        Self { ctx }
    }

    /// Shared context (for control-plane registration)
    pub fn context(&self) -> &Arc<DispatchContext> {
        &self.ctx
    }

    /// Dispatch one task and wait for its terminal outcome.
    ///
    /// Resolves exactly once per task: either the worker's result or, when
    /// none arrives within the configured deadline, a synthetic timeout.
    /// The timeout is advisory to the caller only — it never cancels work
    /// already sent to a worker.
    pub async fn dispatch(&self, kind: TaskKind, request: TaskRequest) -> TaskReport {
        let (task_id, waiter) = {
            let mut state = self.ctx.state.lock().expect("dispatch state poisoned");

            let task_id = state.next_task_id;
            state.next_task_id += 1;

            let worker_id = select_slot(&state.slots, task_id);
            // Optimistic: the slot is about to become busy
            state.slots[worker_id].idle = false;

            let spec = TaskSpec::new(task_id, kind, request);
            send_to_slot(&state.slots[worker_id], worker_id, &spec);
            debug!(task = task_id, worker = worker_id, ?kind, "task dispatched");

            let (tx, rx) = oneshot::channel();
            state.pending.insert(task_id, tx);
            (task_id, rx)
        };

        match tokio::time::timeout(self.ctx.task_timeout, waiter).await {
            Ok(Ok(report)) => report,
            _ => {
                // Deadline elapsed (or the waiter was dropped); synthesize a
                // timeout and forget the task. A result arriving later is
                // discarded in complete().
                self.ctx
                    .state
                    .lock()
                    .expect("dispatch state poisoned")
                    .pending
                    .remove(&task_id);
                info!(task = task_id, "no worker result within deadline, resolving as timeout");
                TaskReport::timeout(task_id)
            }
        }
    }

    /// Handle a `result` message from a worker.
    ///
    /// The slot's idle flag is updated even when the waiter is already
    /// gone — the worker's backlog report stays authoritative after a
    /// dispatch timeout. A result without a registered waiter is
    /// otherwise discarded silently.
    pub fn complete(&self, worker_id: usize, report: TaskReport, idle: bool) {
        let waiter = {
            let mut state = self.ctx.state.lock().expect("dispatch state poisoned");
            match state.slots.get_mut(worker_id) {
                Some(slot) => slot.idle = idle,
                None => {
                    warn!(worker = worker_id, "result from unknown worker slot");
                    return;
                }
            }
            state.pending.remove(&report.id)
        };

        match waiter {
            Some(tx) => {
                debug!(task = report.id, worker = worker_id, status = ?report.status, "task resolved");
                // The receiver may have just timed out; losing the race is fine
                let _ = tx.send(report);
            }
            None => {
                debug!(task = report.id, worker = worker_id, "late result discarded");
            }
        }
    }
}

/// Select the slot for the next task.
///
/// Full ascending scan over all slots; among idle slots the
/// highest-indexed one wins. With no idle slot, fall back to round-robin
/// by dispatch count (`task_id` doubles as the number of tasks dispatched
/// before this one).
fn select_slot(slots: &[WorkerSlot], task_id: u64) -> usize {
    let mut selected = None;
    for (id, slot) in slots.iter().enumerate() {
        if slot.idle {
            selected = Some(id);
        }
    }
    selected.unwrap_or((task_id % slots.len() as u64) as usize)
}

fn send_to_slot(slot: &WorkerSlot, worker_id: usize, spec: &TaskSpec) {
    let Some(connection) = &slot.connection else {
        // No live connection: the send is silently a no-op and the task
        // resolves via the dispatch timeout
        debug!(worker = worker_id, task = spec.id, "slot has no control connection");
        return;
    };

    let envelope = MessageEnvelope::new(WorkerBound::Task { task: spec.clone() });
    match serde_json::to_string(&envelope) {
        Ok(line) => {
            if !connection.send_line(line) {
                debug!(worker = worker_id, task = spec.id, "control connection gone, task not sent");
            }
        }
        Err(e) => warn!(task = spec.id, error = %e, "failed to serialize task message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapfarm_ipc::{SnapshotData, TaskStatus};
    use std::time::Duration;
    use tokio::sync::mpsc;

    use crate::slots::ConnectionHandle;

    fn dispatcher(pool: usize, timeout: Duration) -> Dispatcher {
        Dispatcher::new(Arc::new(DispatchContext::new(pool, timeout)))
    }

    /// Attach a fake connection to a slot, returning the line receiver
    fn attach(d: &Dispatcher, worker_id: usize) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        d.context()
            .register_connection(worker_id, ConnectionHandle::new(tx))
            .unwrap();
        rx
    }

    fn set_idle_flags(d: &Dispatcher, flags: &[bool]) {
        let mut state = d.context().state.lock().unwrap();
        for (slot, idle) in state.slots.iter_mut().zip(flags) {
            slot.idle = *idle;
        }
    }

    fn sent_task(rx: &mut mpsc::UnboundedReceiver<String>) -> TaskSpec {
        let line = rx.try_recv().expect("no task sent");
        let envelope: MessageEnvelope<WorkerBound> = serde_json::from_str(&line).unwrap();
        let WorkerBound::Task { task } = envelope.message;
        task
    }

    #[test]
    fn test_last_idle_slot_wins() {
        let slots: Vec<WorkerSlot> = [false, true, false, true]
            .iter()
            .map(|idle| WorkerSlot {
                connection: None,
                idle: *idle,
            })
            .collect();
        assert_eq!(select_slot(&slots, 0), 3);
    }

    #[test]
    fn test_round_robin_fallback_when_all_busy() {
        let slots: Vec<WorkerSlot> = (0..4)
            .map(|_| WorkerSlot {
                connection: None,
                idle: false,
            })
            .collect();
        // 9 tasks already dispatched => this one lands on 9 mod 4
        assert_eq!(select_slot(&slots, 9), 1);
    }

    #[tokio::test]
    async fn test_dispatch_sends_task_and_marks_busy() {
        let d = dispatcher(4, Duration::from_millis(200));
        let mut rx3 = attach(&d, 3);
        set_idle_flags(&d, &[false, true, false, true]);

        let d2 = d.clone();
        let handle = tokio::spawn(async move {
            d2.dispatch(TaskKind::Snapshot, TaskRequest::for_url("http://example.com/"))
                .await
        });

        // Selected slot is 3 (last idle), marked busy optimistically
        let task = loop {
            match rx3.try_recv() {
                Ok(line) => {
                    let envelope: MessageEnvelope<WorkerBound> = serde_json::from_str(&line).unwrap();
                    let WorkerBound::Task { task } = envelope.message;
                    break task;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        };
        assert_eq!(task.id, 0);
        assert!(!d.context().idle_flags()[3]);

        // Worker replies: waiter resolves with the real report
        d.complete(
            3,
            TaskReport {
                id: task.id,
                status: TaskStatus::Success,
                data: Some(SnapshotData {
                    path: "shot.jpg".into(),
                    summary: None,
                }),
            },
            true,
        );

        let report = handle.await.unwrap();
        assert_eq!(report.status, TaskStatus::Success);
        assert_eq!(report.data.unwrap().path, "shot.jpg");
        assert!(d.context().idle_flags()[3]);
        assert_eq!(d.context().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unconnected_slot_resolves_via_timeout() {
        let d = dispatcher(2, Duration::from_millis(50));

        let report = d
            .dispatch(TaskKind::Validate, TaskRequest::for_url("http://example.com/"))
            .await;

        assert_eq!(report.status, TaskStatus::Timeout);
        assert_eq!(d.context().pending_count(), 0);
        // The slot stays busy until a worker reports otherwise
        assert!(d.context().idle_flags().iter().any(|idle| !idle));
    }

    #[tokio::test]
    async fn test_late_result_discarded_but_idle_applied() {
        let d = dispatcher(1, Duration::from_millis(30));

        let report = d
            .dispatch(TaskKind::Snapshot, TaskRequest::for_url("http://example.com/"))
            .await;
        assert_eq!(report.status, TaskStatus::Timeout);
        assert!(!d.context().idle_flags()[0]);

        // The genuine result arrives after the timeout already resolved the
        // caller: no waiter remains, no second callback, no error — but the
        // worker's idle report still lands
        d.complete(
            0,
            TaskReport {
                id: report.id,
                status: TaskStatus::Success,
                data: None,
            },
            true,
        );
        assert!(d.context().idle_flags()[0]);
        assert_eq!(d.context().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_task_ids_monotonic_across_kinds() {
        let d = dispatcher(1, Duration::from_millis(10));
        let r1 = d.dispatch(TaskKind::Snapshot, TaskRequest::for_url("http://a/")).await;
        let r2 = d.dispatch(TaskKind::Validate, TaskRequest::for_url("http://b/")).await;
        assert_eq!(r1.id, 0);
        assert_eq!(r2.id, 1);
    }

    #[tokio::test]
    async fn test_all_busy_falls_back_round_robin_over_connections() {
        let d = dispatcher(2, Duration::from_millis(100));
        let mut rx0 = attach(&d, 0);
        let mut rx1 = attach(&d, 1);
        set_idle_flags(&d, &[false, false]);

        let d2 = d.clone();
        tokio::spawn(async move {
            // ids 0 and 1 => slots 0 and 1
            let _ = d2.dispatch(TaskKind::Validate, TaskRequest::for_url("http://a/")).await;
        });
        let d3 = d.clone();
        tokio::spawn(async move {
            let _ = d3.dispatch(TaskKind::Validate, TaskRequest::for_url("http://b/")).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let t0 = sent_task(&mut rx0);
        let t1 = sent_task(&mut rx1);
        assert_eq!(t0.id % 2, 0);
        assert_eq!(t1.id % 2, 1);
    }
}

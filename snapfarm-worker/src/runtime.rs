//! Worker runtime: control connection, task loop and execution deadline
//!
//! A single loop owns the task queue. Incoming `task` messages go through
//! queue admission; finished executions come back over an internal channel,
//! get reported to the master with the current idle flag and release the
//! next backlog entry. The connection is redialed forever; the queue
//! survives reconnects so in-flight work is never lost to a master restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use snapfarm_ipc::{
    ControlChannel, IpcError, MasterBound, MessageEnvelope, MessageWriter, TaskKind, TaskReport,
    TaskSpec, TaskStatus, WorkerBound,
};

use crate::engine::{EngineError, RenderEngine};
use crate::error::WorkerError;
use crate::queue::{Admission, RunnableTask, TaskQueue};
use crate::storage::storage_paths;

const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Static parameters of one worker process
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Master control-plane address to dial
    pub control_addr: String,
    /// Slot id assigned by the supervisor
    pub worker_id: usize,
    /// Concurrent execution limit (M)
    pub max_in_flight: usize,
    /// Per-task execution deadline; also the backlog staleness bound
    pub task_timeout: Duration,
    /// Directory snapshots are written under
    pub storage_base: PathBuf,
}

/// Run the worker until the process is killed.
///
/// Dials the control address, serves the connection and redials on any
/// close or error. The queue and any in-flight executions persist across
/// reconnects.
pub async fn run(options: RuntimeOptions, engine: Arc<dyn RenderEngine>) -> Result<(), WorkerError> {
    let mut queue = TaskQueue::new(options.max_in_flight, options.task_timeout);
    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();

    loop {
        match ControlChannel::connect(&options.control_addr).await {
            Ok(channel) => {
                info!(addr = %options.control_addr, "connected to master");
                if let Err(e) = serve_connection(
                    channel,
                    &options,
                    &mut queue,
                    &completion_tx,
                    &mut completion_rx,
                    &engine,
                )
                .await
                {
                    info!(error = %e, "control connection lost, reconnecting");
                }
            }
            Err(e) => {
                debug!(addr = %options.control_addr, error = %e, "master not reachable yet");
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Serve one control connection until it closes or fails
async fn serve_connection(
    channel: ControlChannel,
    options: &RuntimeOptions,
    queue: &mut TaskQueue,
    completion_tx: &mpsc::UnboundedSender<TaskReport>,
    completion_rx: &mut mpsc::UnboundedReceiver<TaskReport>,
    engine: &Arc<dyn RenderEngine>,
) -> Result<(), IpcError> {
    let (mut reader, mut writer) = channel.split();

    writer
        .write(&MessageEnvelope::new(MasterBound::Connected {
            worker_id: options.worker_id,
        }))
        .await?;

    // Socket reads get their own task. A line read is not safe to cancel
    // mid-envelope, so the select loop below must never race the read
    // future directly against completions: it consumes whole envelopes
    // from this channel instead.
    let (incoming_tx, mut incoming_rx) = mpsc::unbounded_channel();
    let reader_task = tokio::spawn(async move {
        loop {
            match reader.read::<WorkerBound>().await {
                Ok(envelope) => {
                    if incoming_tx.send(Ok(envelope)).is_err() {
                        return;
                    }
                }
                // Malformed line; the connection itself is still good
                Err(e @ IpcError::DeserializationError(_)) => {
                    if incoming_tx.send(Err(e)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let _ = incoming_tx.send(Err(e));
                    return;
                }
            }
        }
    });

    let result = drive_connection(
        options,
        queue,
        completion_tx,
        completion_rx,
        engine,
        &mut writer,
        &mut incoming_rx,
    )
    .await;
    reader_task.abort();
    result
}

/// Pump envelopes and completions until the connection is done
async fn drive_connection(
    options: &RuntimeOptions,
    queue: &mut TaskQueue,
    completion_tx: &mpsc::UnboundedSender<TaskReport>,
    completion_rx: &mut mpsc::UnboundedReceiver<TaskReport>,
    engine: &Arc<dyn RenderEngine>,
    writer: &mut MessageWriter<OwnedWriteHalf>,
    incoming_rx: &mut mpsc::UnboundedReceiver<Result<MessageEnvelope<WorkerBound>, IpcError>>,
) -> Result<(), IpcError> {
    loop {
        tokio::select! {
            incoming = incoming_rx.recv() => {
                let envelope = match incoming {
                    Some(Ok(envelope)) => envelope,
                    Some(Err(e @ IpcError::DeserializationError(_))) => {
                        warn!(error = %e, "ignoring malformed control message");
                        continue;
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Err(IpcError::ConnectionClosed),
                };
                let WorkerBound::Task { task } = envelope.message;
                info!(task = task.id, kind = ?task.kind, "task received");

                match queue.admit(task, Instant::now()) {
                    Admission::Execute(runnable) => {
                        spawn_execution(runnable, engine, &options.storage_base, completion_tx);
                    }
                    Admission::Queued => {
                        debug!(backlog = queue.backlog_len(), "task queued");
                    }
                }
            }

            Some(report) = completion_rx.recv() => {
                let done = queue.complete(report.id, Instant::now());
                for id in &done.discarded {
                    info!(task = id, "discarding stale queued task");
                }

                writer
                    .write(&MessageEnvelope::new(MasterBound::Result {
                        worker_id: options.worker_id,
                        task: report,
                        idle: done.idle,
                    }))
                    .await?;

                if let Some(runnable) = done.next {
                    spawn_execution(runnable, engine, &options.storage_base, completion_tx);
                }
            }
        }
    }
}

/// Run one task in the background, bounded by its remaining deadline
fn spawn_execution(
    runnable: RunnableTask,
    engine: &Arc<dyn RenderEngine>,
    storage_base: &Path,
    completion_tx: &mpsc::UnboundedSender<TaskReport>,
) {
    let engine = Arc::clone(engine);
    let storage_base = storage_base.to_path_buf();
    let completion_tx = completion_tx.clone();

    tokio::spawn(async move {
        let RunnableTask { task, remaining } = runnable;
        let task_id = task.id;

        let report =
            match tokio::time::timeout(remaining, execute_task(&*engine, &task, &storage_base)).await {
                Ok(report) => report,
                Err(_) => {
                    warn!(task = task_id, "execution deadline hit, aborting render");
                    TaskReport {
                        id: task_id,
                        status: TaskStatus::Timeout,
                        data: None,
                    }
                }
            };

        // Receiver only drops at process teardown
        let _ = completion_tx.send(report);
    });
}

async fn execute_task(engine: &dyn RenderEngine, task: &TaskSpec, storage_base: &Path) -> TaskReport {
    let outcome = match task.kind {
        TaskKind::Snapshot => {
            let paths = storage_paths(storage_base, &task.request);
            engine.snapshot(task, &paths).await.map(Some)
        }
        TaskKind::Validate => engine.validate(task).await.map(|()| None),
    };

    match outcome {
        Ok(data) => {
            info!(task = task.id, kind = ?task.kind, "task done");
            TaskReport {
                id: task.id,
                status: TaskStatus::Success,
                data,
            }
        }
        Err(e @ EngineError::Open { .. }) => {
            info!(task = task.id, error = %e, "task failed");
            TaskReport {
                id: task.id,
                status: TaskStatus::Fail,
                data: None,
            }
        }
        Err(e) => {
            warn!(task = task.id, error = %e, "task failed");
            TaskReport {
                id: task.id,
                status: TaskStatus::Fail,
                data: None,
            }
        }
    }
}

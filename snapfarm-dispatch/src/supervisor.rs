//! Worker pool supervision
//!
//! Spawns the fixed pool of renderer worker processes and keeps each slot
//! populated: when a worker exits for any reason its slot's monitor
//! respawns a replacement immediately, with the same slot id. Slot
//! identity never changes across respawn, so the control plane keeps
//! addressing the same slot table.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::DispatchError;

/// Static configuration for one worker pool
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Worker executable, resolved via PATH when not absolute
    pub worker_binary: String,
    /// Number of slots; fixed for the supervisor's lifetime
    pub pool_size: usize,
    /// Control-plane port the workers dial back into
    pub control_port: u16,
    /// Extra environment passed to every worker process
    pub worker_env: Vec<(String, String)>,
}

/// Supervises one fixed-size pool of worker processes.
pub struct WorkerPoolSupervisor {
    config: SupervisorConfig,
    shutdown: watch::Sender<bool>,
    monitors: Vec<JoinHandle<()>>,
    pids: Arc<Mutex<Vec<Option<u32>>>>,
}

impl WorkerPoolSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        let pids = Arc::new(Mutex::new(vec![None; config.pool_size]));
        Self {
            config,
            shutdown,
            monitors: Vec::new(),
            pids,
        }
    }

    /// Start one monitor per slot. Idempotent start is not supported;
    /// calling twice is a caller bug and returns an error.
    pub fn start(&mut self) -> Result<(), DispatchError> {
        if !self.monitors.is_empty() {
            return Err(DispatchError::Supervisor(
                "worker pool already started".to_string(),
            ));
        }
        if self.config.pool_size == 0 {
            return Err(DispatchError::Supervisor(
                "pool size must be at least 1".to_string(),
            ));
        }

        info!(
            workers = self.config.pool_size,
            binary = %self.config.worker_binary,
            "starting worker pool"
        );
        for slot_id in 0..self.config.pool_size {
            let config = self.config.clone();
            let shutdown = self.shutdown.subscribe();
            let pids = Arc::clone(&self.pids);
            self.monitors
                .push(tokio::spawn(monitor_slot(config, slot_id, shutdown, pids)));
        }
        Ok(())
    }

    /// Stop all monitors and kill the worker processes. Idempotent.
    pub async fn stop(&mut self) {
        if self.monitors.is_empty() {
            return;
        }
        info!("stopping worker pool");
        let _ = self.shutdown.send(true);
        for monitor in self.monitors.drain(..) {
            let _ = monitor.await;
        }
    }

    /// Pids of currently-running workers, slot-ordered; `None` for a slot
    /// whose process is between respawns
    pub fn worker_pids(&self) -> Vec<Option<u32>> {
        self.pids.lock().expect("pid table poisoned").clone()
    }
}

/// One slot's supervision loop: spawn, wait, respawn until shutdown.
async fn monitor_slot(
    config: SupervisorConfig,
    slot_id: usize,
    mut shutdown: watch::Receiver<bool>,
    pids: Arc<Mutex<Vec<Option<u32>>>>,
) {
    let mut restarts: u64 = 0;
    loop {
        if *shutdown.borrow() {
            return;
        }

        let mut child = match spawn_worker(&config, slot_id) {
            Ok(child) => child,
            Err(e) => {
                error!(slot = slot_id, error = %e, "failed to spawn worker, retrying");
                // Don't spin on a missing or broken binary
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => continue,
                }
            }
        };

        let pid = child.id();
        pids.lock().expect("pid table poisoned")[slot_id] = pid;
        if restarts == 0 {
            info!(slot = slot_id, pid, "worker started");
        } else {
            info!(slot = slot_id, pid, restarts, "worker restarted");
        }

        tokio::select! {
            status = child.wait() => {
                pids.lock().expect("pid table poisoned")[slot_id] = None;
                match status {
                    Ok(status) => warn!(slot = slot_id, %status, "worker exited, respawning"),
                    Err(e) => warn!(slot = slot_id, error = %e, "lost track of worker, respawning"),
                }
                restarts += 1;
            }
            _ = shutdown.changed() => {
                if let Err(e) = child.kill().await {
                    warn!(slot = slot_id, error = %e, "failed to kill worker");
                }
                pids.lock().expect("pid table poisoned")[slot_id] = None;
                return;
            }
        }
    }
}

fn spawn_worker(
    config: &SupervisorConfig,
    slot_id: usize,
) -> std::io::Result<tokio::process::Child> {
    let mut command = Command::new(&config.worker_binary);
    command
        .arg(config.control_port.to_string())
        .arg(slot_id.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    for (key, value) in &config.worker_env {
        command.env(key, value);
    }
    command.spawn()
}

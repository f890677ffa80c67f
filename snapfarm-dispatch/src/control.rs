//! Control-plane listener
//!
//! Workers dial in over TCP and speak newline-delimited JSON envelopes.
//! Each connection runs a reader loop (worker messages into the
//! dispatcher) and a writer task (pre-serialized task lines out of the
//! slot's [`ConnectionHandle`]). A connection stays registered in its
//! slot until the worker's next `connected` replaces it; closes are
//! observed but never deregister, so tasks sent during a respawn gap
//! simply resolve through the dispatch timeout.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use snapfarm_ipc::{ControlChannel, IpcError, MasterBound};

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::slots::ConnectionHandle;

/// Listener side of the worker control plane
pub struct ControlPlane {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl ControlPlane {
    /// Bind the control listener and start accepting worker connections
    pub async fn bind(addr: &str, dispatcher: Dispatcher) -> Result<Self, DispatchError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DispatchError::ControlPlane(format!("failed to bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| DispatchError::ControlPlane(e.to_string()))?;
        info!(%local_addr, "control plane listening");

        let accept_task = tokio::spawn(accept_loop(listener, dispatcher));
        Ok(Self {
            local_addr,
            accept_task,
        })
    }

    /// Address the listener actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections. Established connections are
    /// dropped when their worker processes die.
    pub fn stop(&self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, dispatcher: Dispatcher) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "control connection accepted");
                let dispatcher = dispatcher.clone();
                tokio::spawn(handle_connection(stream, peer, dispatcher));
            }
            Err(e) => {
                warn!(error = %e, "control accept failed");
            }
        }
    }
}

/// Drive one worker connection until it closes.
async fn handle_connection(stream: TcpStream, peer: SocketAddr, dispatcher: Dispatcher) {
    let (mut reader, mut writer) = ControlChannel::new(stream).split();

    // The dispatcher queues serialized lines here; this task owns the
    // socket's write half
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            if let Err(e) = writer.write_line(&line).await {
                debug!(error = %e, "control write failed");
                break;
            }
        }
    });

    let mut slot: Option<usize> = None;
    loop {
        let envelope = match reader.read::<MasterBound>().await {
            Ok(envelope) => envelope,
            Err(IpcError::ConnectionClosed) => {
                info!(%peer, slot = ?slot, "control connection closed");
                break;
            }
            Err(e) if e.is_fatal() => {
                warn!(%peer, error = %e, "dropping control connection");
                break;
            }
            Err(e) if e.is_retryable() => {
                warn!(%peer, error = %e, "control read failed");
                break;
            }
            Err(e) => {
                // Malformed line; skip it and keep the connection
                warn!(%peer, error = %e, "ignoring malformed control message");
                continue;
            }
        };

        match envelope.message {
            MasterBound::Connected { worker_id } => {
                let handle = ConnectionHandle::new(line_tx.clone());
                match dispatcher.context().register_connection(worker_id, handle) {
                    Some(false) => info!(%peer, worker = worker_id, "worker connected"),
                    Some(true) => info!(%peer, worker = worker_id, "worker reconnected"),
                    None => {
                        warn!(%peer, worker = worker_id, "connect from unknown worker slot");
                        break;
                    }
                }
                slot = Some(worker_id);
            }
            MasterBound::Result {
                worker_id,
                task,
                idle,
            } => {
                dispatcher.complete(worker_id, task, idle);
            }
        }
    }

    writer_task.abort();
}

impl Drop for ControlPlane {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

//! Component wiring and lifecycle

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use snapfarm_config::SnapfarmConfig;
use snapfarm_dispatch::{
    ControlPlane, DispatchContext, Dispatcher, SupervisorConfig, WorkerPoolSupervisor,
};

use crate::rpc;

/// A running Snapfarm server: dispatcher, control plane, worker pool and
/// RPC front end
pub struct App {
    dispatcher: Dispatcher,
    control: ControlPlane,
    supervisor: WorkerPoolSupervisor,
    rpc_addr: SocketAddr,
    rpc_task: JoinHandle<()>,
}

impl App {
    /// Start every component. On a partial failure, anything already
    /// running is torn down before the error is returned.
    pub async fn start(config: SnapfarmConfig) -> anyhow::Result<Self> {
        let ctx = Arc::new(DispatchContext::new(
            config.pool.workers,
            config.pool.task_timeout,
        ));
        let dispatcher = Dispatcher::new(ctx);

        let control = ControlPlane::bind(&config.control.addr(), dispatcher.clone())
            .await
            .context("failed to start control plane")?;

        let mut supervisor = WorkerPoolSupervisor::new(SupervisorConfig {
            worker_binary: config.engine.worker_binary.display().to_string(),
            pool_size: config.pool.workers,
            control_port: control.local_addr().port(),
            worker_env: worker_env(&config),
        });
        if let Err(e) = supervisor.start() {
            control.stop();
            return Err(e).context("failed to start worker pool");
        }

        let rpc_listener = match TcpListener::bind(config.rpc.addr()).await {
            Ok(listener) => listener,
            Err(e) => {
                supervisor.stop().await;
                control.stop();
                return Err(e).context("failed to bind RPC listener");
            }
        };
        let rpc_addr = rpc_listener
            .local_addr()
            .context("failed to resolve RPC address")?;
        info!(%rpc_addr, "rpc intake listening");

        let router = rpc::router(dispatcher.clone());
        let rpc_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(rpc_listener, router).await {
                error!(error = %e, "rpc server terminated");
            }
        });

        Ok(Self {
            dispatcher,
            control,
            supervisor,
            rpc_addr,
            rpc_task,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    /// Block until Ctrl-C, then tear everything down
    pub async fn run_until_shutdown(mut self) -> anyhow::Result<()> {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("shutdown signal received");
        self.stop().await;
        Ok(())
    }

    /// Stop all components. Idempotent.
    pub async fn stop(&mut self) {
        self.supervisor.stop().await;
        self.control.stop();
        self.rpc_task.abort();
        info!("server stopped");
    }
}

/// Environment handed to every spawned worker process
fn worker_env(config: &SnapfarmConfig) -> Vec<(String, String)> {
    vec![
        (
            "SNAPFARM_MAX_CONCURRENT_TASKS".to_string(),
            config.pool.max_concurrent_tasks.to_string(),
        ),
        (
            "SNAPFARM_TASK_TIMEOUT_SECONDS".to_string(),
            config.pool.task_timeout.as_secs().to_string(),
        ),
        (
            "SNAPFARM_STORAGE_BASE_PATH".to_string(),
            config.storage.base_path.display().to_string(),
        ),
        (
            "SNAPFARM_USER_AGENT".to_string(),
            config.engine.default_user_agent.clone(),
        ),
        (
            "SNAPFARM_LOG_LEVEL".to_string(),
            config.logging.level.to_string(),
        ),
        (
            "SNAPFARM_LOG_FORMAT".to_string(),
            config.logging.format.to_string(),
        ),
    ]
}

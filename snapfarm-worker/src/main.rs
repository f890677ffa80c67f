//! Renderer worker entry point
//!
//! Launched by the master's pool supervisor with the control port and the
//! assigned slot id; everything else arrives through `SNAPFARM_*`
//! environment variables.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use snapfarm_config::{ConfigLoader, EngineKind, LogFormat};
use snapfarm_worker::{run, HttpEngine, RenderEngine, RuntimeOptions};

#[derive(Parser)]
#[command(name = "snapfarm-worker", about = "Snapfarm renderer worker process")]
struct Cli {
    /// Master control-plane port to dial
    control_port: u16,

    /// Pool slot id assigned by the supervisor
    worker_id: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .from_env()
        .context("invalid worker configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_string()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match config.logging.format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Pretty => subscriber.pretty().init(),
        LogFormat::Text => subscriber.init(),
    }

    info!(worker = cli.worker_id, port = cli.control_port, "worker starting");

    let engine: Arc<dyn RenderEngine> = match config.engine.kind {
        EngineKind::Http => Arc::new(
            HttpEngine::new(config.engine.default_user_agent.clone())
                .context("failed to build render engine")?,
        ),
    };

    let options = RuntimeOptions {
        control_addr: format!("127.0.0.1:{}", cli.control_port),
        worker_id: cli.worker_id,
        max_in_flight: config.pool.max_concurrent_tasks,
        task_timeout: config.pool.task_timeout,
        storage_base: config.storage.base_path.clone(),
    };

    run(options, engine).await?;
    Ok(())
}

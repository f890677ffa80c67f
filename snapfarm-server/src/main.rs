//! Snapfarm server entry point

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use snapfarm_config::{ConfigLoader, LogFormat, SnapfarmConfig};
use snapfarm_server::App;

#[derive(Parser)]
#[command(
    name = "snapfarm-server",
    about = "Webpage snapshot farm: RPC intake, dispatcher and worker pool",
    version
)]
struct Cli {
    /// Configuration file (YAML); environment overrides still apply
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    sample_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.sample_config {
        print!("{}", SnapfarmConfig::generate_sample());
        return Ok(());
    }

    let config = ConfigLoader::new()
        .load(cli.config.as_ref())
        .context("invalid configuration")?;

    if cli.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_string()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Pretty => subscriber.pretty().init(),
        LogFormat::Text => subscriber.init(),
    }

    info!(
        workers = config.pool.workers,
        control = %config.control.addr(),
        rpc = %config.rpc.addr(),
        "starting snapfarm server"
    );

    let app = App::start(config).await?;
    app.run_until_shutdown().await
}

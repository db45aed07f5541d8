use clap::Parser;
use tracing_subscriber::EnvFilter;

use pos_lv2::config::{DEFAULT_LOG_FILTER, Settings};
use pos_lv2::server;

/// POS Lv2 backend API server
#[derive(Parser, Debug)]
#[command(name = "pos-lv2", version, about)]
struct Args {
    /// Address to bind (overrides POS_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides POS_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Runtime worker threads (overrides POS_WORKERS)
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv_override().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let mut settings = Settings::from_env()?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(workers) = args.workers {
        settings.server.workers = workers;
    }
    settings.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.server.workers)
        .thread_name("pos-worker")
        .enable_all()
        .build()?;
    runtime.block_on(server::serve(settings))
}

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use cinder_server::ServerConfig;

const AOF_FILE: &str = "cinder.aof";

#[derive(Debug, Parser)]
#[command(name = "cinder-server", version, about = "In-memory key-value store speaking RESP")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "CINDER_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 6379, env = "CINDER_PORT")]
    port: u16,

    /// Enable the append-only log so writes survive a restart
    #[arg(long, env = "CINDER_APPENDONLY")]
    appendonly: bool,

    /// Directory holding the append-only log
    #[arg(long, default_value = ".", env = "CINDER_DATA_DIR")]
    data_dir: PathBuf,

    /// Milliseconds between background syncs of the log to disk
    #[arg(long, default_value_t = 1000, env = "CINDER_SYNC_INTERVAL_MS")]
    sync_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = ServerConfig {
        aof_path: args.appendonly.then(|| args.data_dir.join(AOF_FILE)),
        sync_interval: Duration::from_millis(args.sync_interval_ms),
    };

    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    cinder_server::run(listener, config).await?;
    Ok(())
}

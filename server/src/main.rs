//! TCP entry point for the Contrast match server.

use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use contrast_server::{net, Server};

const DEFAULT_PORT: u16 = 8765;
const RESULTS_LOG: &str = "game_results.log";

#[derive(Parser, Debug)]
#[command(name = "contrast-server")]
#[command(about = "Authoritative match server for Contrast")]
struct Args {
    /// Listen port; falls back to CONTRAST_SERVER_PORT, then 8765
    #[arg(long)]
    port: Option<u16>,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let default = if std::env::var("CONTRAST_DEBUG").is_ok() {
        "debug"
    } else if std::env::var("CONTRAST_SILENT").is_ok() {
        "error"
    } else if std::env::var("CONTRAST_MINIMAL").is_ok() {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_port(arg: Option<u16>) -> u16 {
    if let Some(port) = arg {
        return port;
    }
    std::env::var("CONTRAST_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_PORT)
}

fn open_results_log() -> Option<std::fs::File> {
    match OpenOptions::new().create(true).append(true).open(RESULTS_LOG) {
        Ok(mut file) => {
            let unix = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            use std::io::Write as _;
            let _ = writeln!(file, "=== New session started (unix {unix}) ===");
            Some(file)
        }
        Err(err) => {
            warn!(error = %err, "could not open {RESULTS_LOG} for writing");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let port = resolve_port(args.port);

    let log_board = std::env::var("CONTRAST_SERVER_LOG_BOARD").is_ok_and(|v| v == "1");
    let server = Arc::new(Server::new(open_results_log(), log_board));

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!(port, "server listening");

    net::serve(listener, server).await;
    Ok(())
}

//! keel-server: terminal session and language-server gateway.
//!
//! Runs two WebSocket listeners: the terminal endpoint, which manages PTY
//! sessions for connected clients, and the LSP proxy, which bridges editor
//! connections to language-server child processes.

mod connection;
mod protocol;
mod server;

use std::path::PathBuf;

use clap::Parser;

use keel_config::{toml_loader, validation, KeelConfig};
use keel_lsp::LspProxy;

use crate::server::TerminalServer;

#[derive(Parser)]
#[command(name = "keel-server", about = "Terminal and language-server gateway")]
struct Args {
    /// Path to a config file. Defaults to the platform config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<KeelConfig, keel_common::ConfigError> {
    let config = match &args.config {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keel=info".into()),
        )
        .init();

    // Panics in spawned tasks must land in the log, not on a bare stderr.
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("unhandled panic: {info}");
    }));

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let terminal = TerminalServer::bind(&config)
        .await
        .expect("Failed to bind terminal listener");
    let lsp = LspProxy::bind(&config.lsp)
        .await
        .expect("Failed to bind lsp listener");

    tracing::info!(
        terminal = %terminal.local_addr(),
        lsp = %lsp.local_addr(),
        "keel-server running"
    );

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl-c");

    tracing::info!("shutting down");
    terminal.shutdown().await;
    lsp.dispose().await;
}

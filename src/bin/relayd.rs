//! Chat relay daemon
//!
//! Accepts line-oriented chat clients over TCP, keeps the nickname registry,
//! and relays broadcast and private messages between them.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port (12345)
//! relayd
//!
//! # Listen on another port
//! relayd --port 4000
//!
//! # Load settings from a TOML file
//! relayd --config /etc/relayd.toml
//!
//! # Override the listen address from the environment
//! RELAY_LISTEN=127.0.0.1:4000 relayd
//!
//! # Enable debug logging (logs every relayed line)
//! RUST_LOG=relayd=debug relayd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting and exit

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relayd::config::{RelayConfig, CONFIG_ENV};
use relayd::registry::spawn_registry;
use relayd::server::RelayServer;

/// Chat relay daemon
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// TOML config file (also read from RELAY_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:12345
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Port to listen on, keeping the configured host
    #[arg(short, long)]
    port: Option<u16>,
}

/// Builds the effective config: defaults, file, environment, then flags.
fn resolve_config(args: &Args) -> Result<RelayConfig> {
    let path = args
        .config
        .clone()
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

    let mut config = match path {
        Some(path) => RelayConfig::load(&path)?,
        None => RelayConfig::default(),
    };

    config.apply_env()?;

    if let Some(listen) = &args.listen {
        config.apply_listen_override("--listen", listen)?;
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args).context("Invalid configuration")?;
    run_relay(config)
}

/// Runs the relay (async entry point).
#[tokio::main]
async fn run_relay(config: RelayConfig) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relayd=info".parse()?)
                .add_directive("relay_core=info".parse()?)
                .add_directive("relay_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Chat relay starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Spawn the identity registry
    let registry = spawn_registry();
    info!("Identity registry started");

    // Without its port the relay cannot do anything: fail fast
    let server = RelayServer::bind(config.clone(), registry, cancel_token)
        .await
        .with_context(|| format!("Failed to start listener on {}", config.listen))?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Chat relay stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

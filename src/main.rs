//! Socki Server
//!
//! Run with: cargo run -- --addr :5000
//!
//! # Configuration
//!
//! Settings are read from `--config`, or from the first of
//! `~/.config/socki/config.toml`, `/etc/socki/config.toml` and
//! `./config.toml`, then overridden by `SOCKI_*` environment variables.
//! `RUST_LOG` takes precedence over the configured log level.

use anyhow::Context;
use clap::{Parser, Subcommand};
use socki::api::{self, AppState};
use socki::config::{self, Config, LoggingConfig};
use socki::websocket::Hub;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "socki")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Single-room real-time chat server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server address of the API and web app, e.g. ":5000" or "127.0.0.1:5000"
    #[arg(long)]
    pub addr: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of static web assets
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a default config file
    PrintConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::PrintConfig) = cli.command {
        print!("{}", config::generate_default_config());
        return Ok(());
    }

    // Load errors are returned rather than logged: tracing is not set up yet
    let source = cli.config.clone().or_else(Config::find_default);
    let mut config = match &source {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::from_env().context("reading SOCKI_* environment")?,
    };
    if let Some(addr) = &cli.addr {
        config.server.set_addr(addr)?;
    }
    if let Some(dir) = cli.static_dir {
        config.server.static_dir = Some(dir);
    }

    init_tracing(&config.logging)?;

    tracing::info!("Starting socki v{}", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    let shutdown = CancellationToken::new();
    let (hub, hub_task) = Hub::spawn(config.chatroom.hub_config(), shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            api::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let state = AppState::new(hub, config.chatroom.pump_config());
    let api_config = config.server.api_config();
    let served = api::serve(state, &api_config, shutdown.clone()).await;

    // Make sure the hub stops even if the server failed to start
    shutdown.cancel();
    hub_task.await.context("hub task failed")?;
    served.with_context(|| format!("serving on {}", api_config.addr()))?;

    tracing::info!("Socki stopped");
    Ok(())
}

/// Initialize tracing from the logging config
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("socki={},tower_http=info", logging.level)))
        .context("invalid log level")?;

    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        "pretty" => registry.with(tracing_subscriber::fmt::layer()).init(),
        other => anyhow::bail!("unknown log format {other:?} (expected pretty or json)"),
    }

    Ok(())
}

// crates/server/src/main.rs
//! Taskgate server binary.
//!
//! Wires the built-in tools into a registry, starts the Axum HTTP server,
//! and spawns the periodic job sweeper.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use taskgate_core::ToolRegistry;
use taskgate_server::tools::SimulateWorkTool;
use taskgate_server::{create_app, sweep, AppState, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "taskgate", version, about = "Token-gated background job server")]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "TASKGATE_PORT")]
    port: Option<u16>,

    /// Token signing secret.
    #[arg(long, env = "TASKGATE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Default token lifetime in seconds.
    #[arg(long, env = "TASKGATE_TOKEN_TTL_S")]
    token_ttl_s: Option<u64>,

    /// Log verbosity.
    #[arg(long, default_value = "info")]
    log_level: Level,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::from_env();
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secret) = self.secret {
            config.secret = secret;
        }
        if let Some(ttl) = self.token_ttl_s {
            config.token_ttl = Duration::from_secs(ttl);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.into_config();
    if config.uses_dev_secret() {
        tracing::warn!(
            "using the built-in development secret; set TASKGATE_SECRET before exposing this server"
        );
    }

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SimulateWorkTool::new()))?;

    let port = config.port;
    let state = AppState::new(config, registry);
    sweep::spawn_sweeper(Arc::clone(&state));

    let app = create_app(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "taskgate listening");

    axum::serve(listener, app).await?;
    Ok(())
}

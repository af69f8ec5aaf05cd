//! Admission gateway entry point.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                   ADMISSION GATEWAY                      │
//!                 │                                                          │
//!  Client ───────▶│ trace → request id → security headers → CORS             │
//!                 │                                   │                      │
//!                 │                                   ▼                      │
//!                 │                        ┌────────────────────┐            │
//!                 │   429 ◀──── deny ──────│  admission guard   │            │
//!                 │                        │ (per-client window)│            │
//!                 │                        └─────────┬──────────┘            │
//!                 │                                  │ allow                 │
//!                 │                                  ▼                       │
//!                 │                  body limit → timeout → forwarder ───────┼──▶ Backend
//!                 │                                                          │
//!                 │  Cross-cutting: config · observability · lifecycle       │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use admission_gateway::config::load_config;
use admission_gateway::lifecycle::startup;
use admission_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "admission-gateway")]
#[command(about = "Per-client rate limiting gateway", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        limit = config.rate_limit.limit,
        window_ms = config.rate_limit.window_ms,
        "admission-gateway starting"
    );

    startup::run(config).await
}

//! transcript-proxy
//!
//! Forwards every request to a single upstream target and prints what went
//! over the wire.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request     ┌──────────┐   ┌──────────────┐   ┌────────────────────┐
//!     ──────────────────▶│  http    │──▶│   request    │──▶│ observing transport│──▶ Upstream
//!                        │  server  │   │   rewrite    │   │  capture + render  │
//!     Client Response    │          │   ┌──────────────┐   │                    │
//!     ◀──────────────────│          │◀──│   response   │◀──│  emit transcript   │◀── Target
//!                        └──────────┘   └──────────────┘   └─────────┬──────────┘
//!                                                                    ▼
//!                                                           stdout / tracing
//! ```
//!
//! Configuration precedence: defaults, `--config` file, `TARGET`/`PORT`
//! environment variables, then command-line flags.

use std::path::PathBuf;

use clap::Parser;

use transcript_proxy::config::{load_config, Overrides};
use transcript_proxy::lifecycle::{self, signals, Shutdown};
use transcript_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "transcript-proxy")]
#[command(about = "Reverse proxy that prints a transcript of every request and response", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream target URL (overrides TARGET)
    #[arg(short, long)]
    target: Option<String>,

    /// Listen port (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            target: self.target.clone(),
            port: self.port,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let from_env = Overrides::from_env(|key| std::env::var(key).ok())?;
    let config = load_config(cli.config.as_deref(), &[from_env, cli.overrides()])?;

    logging::init_logging(&config.observability);
    tracing::info!("transcript-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Shutdown::new();
    signals::forward_signals(shutdown.clone());

    lifecycle::start(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

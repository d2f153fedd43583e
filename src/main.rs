//! TCP Load Balancer
//!
//! Accepts clients on a port and relays each one, byte for byte, to the next
//! backend in a fixed round-robin pool.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  LOAD BALANCER                   │
//!                        │                                                  │
//!     Client ────────────┼─▶┌──────────┐   ┌──────────────┐                 │
//!                        │  │ listener │──▶│ relay engine │──▶ BackendPool  │
//!                        │  └──────────┘   │ (one thread) │    round robin  │
//!                        │                 └──────┬───────┘                 │
//!                        │        ┌───────────────┼───────────────┐         │
//!                        │        ▼               ▼               ▼         │
//!                        │  ┌───────────┐  ┌────────────┐  ┌───────────┐    │
//!                        │  │multiplexer│  │  registry  │  │ outbound  │    │
//!                        │  │   (mio)   │  │ client↔be  │  │  buffers  │────┼──▶ Backend
//!                        │  └───────────┘  └────────────┘  └───────────┘    │
//!                        │                                                  │
//!                        │  config · logging · metrics · startup            │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use tcp_balancer::config::{load_config, BackendConfig, BalancerConfig};
use tcp_balancer::lifecycle::build_engine;
use tcp_balancer::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "lb")]
#[command(about = "Round-robin TCP load balancer", long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend to balance across, replacing the configured list (repeatable)
    #[arg(short, long = "backend", value_name = "HOST:PORT")]
    backends: Vec<BackendConfig>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::default(),
    };
    if !cli.backends.is_empty() {
        config.backends = cli.backends;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability);
    tracing::info!("lb v{} starting", env!("CARGO_PKG_VERSION"));

    let mut engine = build_engine(&config, cli.port)?;

    tracing::info!(
        address = %engine.local_addr(),
        backends = config.backends.len(),
        buffer_size = config.relay.buffer_size,
        max_events = config.relay.max_events,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address);
    }

    engine.run()?;
    Ok(())
}

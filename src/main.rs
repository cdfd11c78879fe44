//! Permissioned-ledger gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                      GATEWAY                         │
//!   REST client   │  ┌────────┐   ┌────────────┐   ┌──────────────────┐  │
//!   ─────────────▶│  │  http  │──▶│  pipeline  │──▶│ NetworkSdk       │──┼──▶ peers /
//!                 │  │ server │   │ + retries  │   │ (session, cache) │  │    orderer
//!                 │  └────────┘   └────────────┘   └────────┬─────────┘  │
//!                 │       ▲                                  │ events     │
//!   socket client │  ┌────┴─────┐   ┌──────────────┐         ▼            │
//!   ◀─────────────┼──│ /socket  │◀──│ block relay  │◀── EventHub          │
//!                 │  └──────────┘   └──────────────┘                      │
//!                 │                                                        │
//!                 │  config · observability · lifecycle (startup/shutdown)│
//!                 └──────────────────────────────────────────────────────┘
//! ```
//!
//! The binary runs against the in-process simulated network; channels named
//! with `--channel` are created on it at startup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use fabric_gateway::config::load_config;
use fabric_gateway::fabric::SimNetwork;
use fabric_gateway::lifecycle::{bootstrap, signals, Shutdown};
use fabric_gateway::net::tls::load_tls_config;
use fabric_gateway::observability::{logging, metrics};
use fabric_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "fabric-gateway")]
#[command(about = "REST and socket gateway for a permissioned ledger network", long_about = None)]
struct Args {
    /// TOML configuration file; defaults plus environment overrides when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Channels to create on the simulated network.
    #[arg(long = "channel", default_value = "common")]
    channels: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fabric-gateway starting");

    tracing::info!(
        org = %config.network.org,
        peer = %config.network.peer_address(),
        orderer = %config.network.orderer_address(),
        bind_address = %config.listener.bind_address,
        retry_count = config.invoke.retry_count,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let sim = SimNetwork::new(&config.network);
    for channel in &args.channels {
        sim.add_channel(channel);
    }

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_handler(shutdown.clone());

    let listener_config = config.listener.clone();
    let ctx = Arc::new(bootstrap(config, Arc::new(sim), shutdown).await?);
    let server = HttpServer::new(ctx);

    match &listener_config.tls {
        Some(tls) => {
            let tls = load_tls_config(tls).await?;
            let addr: std::net::SocketAddr = listener_config.bind_address.parse()?;
            server.run_tls(addr, tls).await?;
        }
        None => {
            let listener = TcpListener::bind(&listener_config.bind_address).await?;
            server.run(listener).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

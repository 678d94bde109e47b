//! CORS forwarding relay (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────┐
//!                    │                      CORS RELAY                          │
//!   Browser request  │  ┌─────────┐   ┌────────────┐   ┌──────────┐            │
//!   ?url=…&h=…  ─────┼─▶│  http   │──▶│ classifier │──▶│  target  │            │
//!                    │  │ adapter │   │ (method)   │   │ (url)    │            │
//!                    │  └─────────┘   └────────────┘   └────┬─────┘            │
//!                    │                                      ▼                   │
//!                    │                                ┌──────────┐             │
//!                    │                                │ headers  │             │
//!                    │                                │ (h + UA) │             │
//!                    │                                └────┬─────┘             │
//!                    │                                     ▼                    │
//!   Response + CORS  │  ┌─────────┐   ┌────────────┐   ┌──────────┐            │
//!   ◀────────────────┼──│  http   │◀──│ translator │◀──│forwarder │◀───────────┼── Target
//!                    │  │ adapter │   │            │   │ (reqwest)│            │    origin
//!                    │  └─────────┘   └────────────┘   └──────────┘            │
//!                    └──────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use cors_relay::config::{load_config, RelayConfig};
use cors_relay::http::HttpServer;
use cors_relay::lifecycle::{signals, Shutdown};
use cors_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "cors-relay")]
#[command(about = "Stateless CORS forwarding relay", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_filter);

    tracing::info!("cors-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        max_redirects = config.upstream.max_redirects,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        signals::termination().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

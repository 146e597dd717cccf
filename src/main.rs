use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use resilient_gateway::config::{load_config, GatewayConfig};
use resilient_gateway::lifecycle::{trigger_on_signal, Shutdown};
use resilient_gateway::observability::{logging, metrics};
use resilient_gateway::{EventBus, HttpServer};

#[derive(Parser)]
#[command(name = "resilient-gateway")]
#[command(about = "Forwarding gateway with a composed resilience pipeline", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resilient-gateway starting");

    if args.config.is_none() {
        tracing::warn!("No configuration file given; running with defaults");
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        destinations = config.destinations.len(),
        routes = config.routes.len(),
        overall_timeout_ms = config.timeouts.overall_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let events = EventBus::new(config.observability.event_buffer);

    let consumer = tokio::spawn(logging::log_events(events.subscribe(), shutdown.subscribe()));
    trigger_on_signal(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, events)?;
    server.run(listener, shutdown.clone()).await?;

    // The server returns early on a listener error; stop the rest too.
    shutdown.trigger();
    let handled = consumer.await?;
    tracing::info!(events = handled, "Shutdown complete");
    Ok(())
}

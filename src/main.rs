//! httpsd demo binary.
//!
//! Loads configuration, initializes logging, and serves a trivial handler.
//! Real deployments use the library and supply their own router.

use axum::routing::get;
use axum::Router;
use clap::Parser;

use httpsd::config::{DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use httpsd::{logging, Server, ServerConfig};

/// Minimal HTTPS front-end with automatic TLS certificates
#[derive(Parser, Debug)]
#[command(name = "httpsd", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "httpsd=debug")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = ServerConfig::load(&args.config)?;

    // Filter priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    logging::init(config.log.as_deref(), &log_filter)?;

    tracing::info!(hostnames = ?config.hostnames, "loaded configuration");

    let app = Router::new().route("/", get(|| async { "httpsd is serving\n" }));

    let server = Server::new(config)?;
    server.serve(app).await?;

    Ok(())
}

//! Negotiating TLS connector (v1)
//!
//! Serves HTTP/1.1 and HTTP/2 on a single TLS port. The protocol is chosen per
//! connection from the client's ALPN list.
//!
//! # Architecture Overview
//!
//! ```text
//!     TCP accept        ┌──────────┐    ┌────────────────┐    ┌───────────────┐
//!     ─────────────────▶│   net    │───▶│   connector    │───▶│  h2 handler   │──▶ Router
//!                       │ listener │    │ TLS + ALPN     │    ├───────────────┤
//!                       └──────────┘    │ selection      │───▶│ http/1.1      │──▶ Router
//!                                       └───────┬────────┘    └───────────────┘
//!                                               │
//!                                               ▼
//!                                       ConnectionEvent stream
//! ```

use std::path::PathBuf;

use clap::Parser;

use negotiating_connector::config::{load_config, ConnectorConfig};
use negotiating_connector::lifecycle::startup;
use negotiating_connector::observability::logging;

#[derive(Parser)]
#[command(name = "negotiating-connector")]
#[command(about = "HTTP/1.1 and HTTP/2 over one TLS port, selected by ALPN", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override `tls.cert_path` (PEM).
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Override `tls.key_path` (PEM).
    #[arg(long)]
    key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ConnectorConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(cert) = cli.cert {
        config.tls.cert_path = cert;
    }
    if let Some(key) = cli.key {
        config.tls.key_path = key;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "negotiating-connector starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        protocols = ?config.alpn.protocols,
        default_protocol = %config.alpn.default_protocol,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

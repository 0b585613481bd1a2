//! Rift Mock CLI
//!
//! Serves the mocks of a YAML file until interrupted.
//!
//! Usage:
//!   rift-mock --config mocks.yaml [--port 8080] [--host 0.0.0.0] [--https]

use clap::Parser;
use rift_mock::{MockServer, MocksConfig, TracingLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Programmable HTTP(S) mock server
#[derive(Parser, Debug)]
#[command(name = "rift-mock")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML file with server options and mock definitions
    #[arg(short, long, env = "RIFT_MOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on, overrides the config file (0 picks a free port)
    #[arg(short, long, env = "RIFT_MOCK_PORT")]
    port: Option<u16>,

    /// Address to bind, overrides the config file
    #[arg(long, env = "RIFT_MOCK_HOST")]
    host: Option<String>,

    /// Serve HTTPS with a self-signed certificate unless the config provides one
    #[arg(long)]
    https: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MocksConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load '{}': {}", path.display(), e))?,
        None => MocksConfig::default(),
    };

    let mut options = config.server.clone();
    if let Some(port) = args.port {
        options.port = port;
    }
    if let Some(host) = args.host {
        options.host = host;
    }
    if args.https {
        options.use_https = true;
    }

    let server = MockServer::start(
        Arc::new(config.file_loader()),
        Arc::new(TracingLogger),
        options,
    )
    .await?;
    let calls = config.register(&server)?;
    info!("Registered {} mock(s), serving at {}", calls.len(), server.url());

    if let Some(pem) = server.certificate_pem() {
        info!("Server certificate:\n{}", pem);
    }

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");
    server.shutdown();
    Ok(())
}

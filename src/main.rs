use clap::Parser;
use csrfguard::config::Config;
use csrfguard::http_server::HttpServer;
use csrfguard::session::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "csrfguard")]
#[command(about = "Session-bound CSRF protection demo server")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CSRFGUARD_CONFIG")]
    config: Option<PathBuf>,
    /// Host to bind to (overrides config)
    #[arg(short = 'H', long, env = "CSRFGUARD_HOST")]
    host: Option<String>,
    /// Port to bind to (overrides config)
    #[arg(short, long, env = "CSRFGUARD_PORT")]
    port: Option<u16>,
    /// Log level
    #[arg(short, long, default_value = "info", env = "CSRFGUARD_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.as_str())
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    // Override with CLI args
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!(
        "Starting csrfguard on {}:{}",
        config.server.host, config.server.port
    );

    let store = if config.session.ttl_seconds > 0 {
        MemoryStore::with_ttl(chrono::Duration::seconds(config.session.ttl_seconds as i64))
    } else {
        MemoryStore::new()
    };

    let http_server = HttpServer::new(config, Arc::new(store));
    http_server.run().await
}

//! natterd entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, warn};
use tracing_subscriber::EnvFilter;

use natter_server::{
    ChatServer, CredentialDirectory, MemoryDirectory, ServerConfig, ServerResult, SessionRegistry,
};

/// natterd - a brokered text chat server
#[derive(Debug, Parser)]
#[command(name = "natterd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on (overrides the config file)
    #[arg(long, env = "NATTER_BIND")]
    bind: Option<String>,

    /// Path to configuration file
    #[arg(long, short, env = "NATTER_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum concurrent connections (overrides the config file)
    #[arg(long)]
    max_connections: Option<usize>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.debug {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ServerResult<()> {
    let mut config = match cli.config {
        Some(ref path) => ServerConfig::load_from(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(max) = cli.max_connections {
        config.max_connections = max;
    }
    if config.users.is_empty() {
        warn!("no user accounts configured; every login will be rejected");
    }

    let directory: Arc<dyn CredentialDirectory> =
        Arc::new(MemoryDirectory::new(config.users.clone()));
    let registry = Arc::new(SessionRegistry::new());

    let server = ChatServer::bind(config).await?;
    server
        .run_until_shutdown(directory, registry, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

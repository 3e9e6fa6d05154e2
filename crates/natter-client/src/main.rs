//! natter CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use natter_client::console::{self, InputAction};
use natter_client::{ClientResult, ClientSession};
use natter_protocol::Command;

/// natter - a brokered text chat client
#[derive(Debug, Parser)]
#[command(name = "natter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server host
    #[arg(long, default_value = "127.0.0.1", env = "NATTER_HOST")]
    host: String,

    /// Server port
    #[arg(long, default_value_t = 8189, env = "NATTER_PORT")]
    port: u16,

    /// Account login
    #[arg(long, short)]
    login: String,

    /// Account password
    #[arg(long, short)]
    password: String,

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
            .unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let session = ClientSession::connect(&cli.host, cli.port).await?;
    session.add_listener(Arc::new(|command: &Command| {
        if let Some(line) = console::render(command) {
            println!("{line}");
        }
    }));
    session.send_auth(&cli.login, &cli.password).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = session.closed() => {
                eprintln!("disconnected");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match console::parse_line(&line) {
                    InputAction::Public(text) => session.send_public_message(&text).await?,
                    InputAction::Private { recipient, text } => {
                        session.send_private_message(&recipient, &text).await?
                    }
                    InputAction::Rename(username) => {
                        session.send_username_change(&username).await?
                    }
                    InputAction::Quit => break,
                    InputAction::Empty => {}
                    InputAction::Invalid(usage) => eprintln!("{usage}"),
                }
            }
        }
    }

    session.close().await;
    Ok(())
}

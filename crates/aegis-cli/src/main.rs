//! # Aegis CLI
//!
//! Administration tool and server launcher.
//!
//! Exit codes: 0 on success, 1 on failure, 2 on usage errors (raised by the
//! argument parser).

#![forbid(unsafe_code)]

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use aegis_server::{Config, Server};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve => serve().await,
        Command::Migrate(command) => commands::migrate::run(command).await,
        Command::Clients(command) => commands::clients::run(command, &cli.endpoint).await,
        Command::Keys(command) => commands::keys::run(command, &cli.endpoint).await,
        Command::Token(command) => commands::token::run(command, &cli.endpoint).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let server = Server::new(config).await?;
    server.run().await
}

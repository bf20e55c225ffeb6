//! Binary crate for the `weather-bridge` command-line host.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Wiring the core bridge to stdout/stdin as the watch link
//! - Logging setup (stderr, so stdout carries only app messages)

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_bridge_cli=info,weather_bridge_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}

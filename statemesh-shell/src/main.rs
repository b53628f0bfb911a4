//! statemesh single-process shell.
//!
//! Runs the in-process broker, the entity registry, a demo mutation
//! source, and the headless UI loop until interrupted.
//!
//! Usage:
//!   statemesh-shell --entities 8 --tick-ms 250

use anyhow::Result;
use clap::Parser;
use statemesh_channel::ChannelConfig;
use statemesh_shell::{Shell, ShellConfig};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "statemesh-shell")]
#[command(about = "statemesh single-process broker, registry, and UI loop")]
struct Args {
    /// Broker endpoint label
    #[arg(long, default_value = "mem://local")]
    endpoint: String,

    /// Credential the broker accepts
    #[arg(long, default_value = "")]
    token: String,

    /// Entities the demo mutation source keeps updating
    #[arg(short, long, default_value = "4")]
    entities: usize,

    /// Milliseconds between demo mutations
    #[arg(long, default_value = "500")]
    tick_ms: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = ShellConfig {
        channel: ChannelConfig {
            endpoint: args.endpoint,
            auth_token: args.token,
        },
        entities: args.entities,
        tick: Duration::from_millis(args.tick_ms),
    };

    info!("starting statemesh shell ({} entities)", config.entities);
    let shell = Shell::start(config).await?;

    tokio::signal::ctrl_c().await?;
    info!("interrupt received; shutting down");

    let model = shell.shutdown().await?;
    info!(
        "final state: {} entities known, {} matching the standing query",
        model.store.entity_count(),
        model.matches.len()
    );
    Ok(())
}

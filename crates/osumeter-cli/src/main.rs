mod cli;
mod commands;
mod shutdown;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Args, Command, TrackArgs};
use shutdown::ShutdownSignal;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("osumeter=info,osumeter_cli=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = args.tracker_config();
    match args.command {
        Some(Command::Offsets) => commands::offsets::run(&config),
        Some(Command::Status { watch }) => {
            commands::status::run(config, watch, setup_shutdown_handler()?)
        }
        Some(Command::Track(track)) => {
            commands::tracking::run(track.apply(config), setup_shutdown_handler()?)
        }
        None => commands::tracking::run(
            TrackArgs::default().apply(config),
            setup_shutdown_handler()?,
        ),
    }
}

/// Ctrl+C flips the shared shutdown signal.
fn setup_shutdown_handler() -> Result<Arc<ShutdownSignal>> {
    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        println!("\nShutting down...");
        shutdown_ctrlc.trigger();
    })?;
    Ok(shutdown)
}

//! Designator CLI
//!
//! Copy Playwright page-object property declarations straight from a running
//! browser. `serve` hosts the daemon the browser extension connects to; every
//! other command talks to that daemon over its local WebSocket port.
//!
//! Usage:
//!   designator serve                         # run the daemon (leave it running)
//!   designator scan                          # list tagged elements in the active tab
//!   designator scan --filter user --copy     # copy the matching declarations
//!   designator pick                          # click an element in the browser to copy it
//!   designator config set-attribute data-qa  # track a different attribute

use std::path::Path;

use anyhow::Context;
use clap::Parser;

use crate::cli::{Cli, Commands};

mod cli;
mod client;
mod output;
mod serve;

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => serve::run(cli.port, args),
        Commands::Scan(args) => client::run_scan(cli.port, args),
        Commands::Pick(args) => client::run_pick(cli.port, args),
        Commands::Stop(args) => client::run_stop(cli.port, args),
        Commands::Config(cmd) => client::run_config(cli.port, cmd),
    };

    if let Err(e) = result {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

/// Stderr logging filtered by `RUST_LOG`, plus an optional file layer. The
/// returned guard must outlive all logging.
fn init_logging(
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let to_file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(to_file)
                .try_init();
            Ok(Some(guard))
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .try_init();
            Ok(None)
        }
    }
}

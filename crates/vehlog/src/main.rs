// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vehlog - vehicle telemetry logger.
//!
//! This is the binary entry point: it loads configuration, installs the
//! tracing subscriber, and dispatches to a subcommand.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod serve;
mod server;
mod summarize;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vehlog_config::model::VehlogConfig;

/// Vehlog - vehicle telemetry logger.
#[derive(Parser, Debug)]
#[command(name = "vehlog", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Accept events over HTTP and summarize trips in the background.
    Serve,
    /// Run one summarization cycle and exit.
    Summarize {
        /// Summarize every queued trip now, even ones still receiving events.
        #[arg(long)]
        force: bool,
    },
    /// Check configuration and database health.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load_config(path: Option<&std::path::Path>) -> VehlogConfig {
    let loaded = match path {
        Some(path) => vehlog_config::load_and_validate_path(path),
        None => vehlog_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            vehlog_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Install the global fmt subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vehlog={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    init_tracing(&config.server.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Summarize { force }) => summarize::run_summarize(&config, force).await,
        Some(Commands::Doctor { plain }) => doctor::run_doctor(&config, plain).await,
        None => {
            println!("vehlog: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

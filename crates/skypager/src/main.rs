// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Skypager - a plugin-oriented application runtime.
//!
//! This is the binary entry point. It loads the project configuration,
//! builds a runtime and drives its features from the command line.

mod features;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use skypager_config::SkypagerConfig;
use skypager_core::SkypagerError;
use skypager_runtime::Runtime;

/// Skypager - a plugin-oriented application runtime.
#[derive(Parser, Debug)]
#[command(name = "skypager", version, about, long_about = None)]
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
    /// List registered features and their status.
    Features {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Enable a single feature and print its status entry.
    Enable {
        /// Registry name of the feature.
        name: String,
        /// Configuration passed to enable, as `key=value` (dotted keys nest).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
    /// Enable every configured feature and print the status map.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => skypager_config::load_and_validate_path(path),
        None => skypager_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            skypager_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.runtime.log_level);

    if let Err(err) = run(cli.command, config).await {
        eprintln!("skypager: {err}");
        std::process::exit(1);
    }
}

async fn run(command: Option<Commands>, config: SkypagerConfig) -> Result<(), SkypagerError> {
    match command {
        Some(Commands::Config) => print_config(&config),
        Some(Commands::Features { json }) => features::run_features(&Runtime::new(config), json),
        Some(Commands::Enable { name, set }) => {
            let cfg = features::parse_assignments(&set)?;
            features::run_enable(&Runtime::new(config), &name, cfg).await
        }
        Some(Commands::Status { json }) => status::run_status(&Runtime::new(config), json).await,
        None => {
            println!("skypager: use --help for available commands");
            Ok(())
        }
    }
}

fn print_config(config: &SkypagerConfig) -> Result<(), SkypagerError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| SkypagerError::Config(format!("failed to render configuration: {e}")))?;
    print!("{rendered}");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("skypager={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

//! Conduit launcher.
//!
//! Subcommands:
//! - `serve` — launch every subsystem through the orchestrator and run
//!   until SIGINT/SIGTERM, then land in reverse dependency order.
//! - `config` — load, validate, and print the resolved configuration.
//! - `version` — print the build version.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conduit_protocol::AppConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

mod serve;
mod subsystems;

#[derive(Parser, Debug)]
#[command(name = "conduit", about = "Multi-database application server", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launch the server and run until interrupted
    Serve {
        /// Path to the TOML configuration file
        #[arg(long, env = "CONDUIT_CONFIG")]
        config: Option<PathBuf>,

        /// Mirror the full log stream to stderr
        #[arg(long, short)]
        verbose: bool,
    },
    /// Validate and print the resolved configuration
    Config {
        /// Path to the TOML configuration file
        #[arg(long, env = "CONDUIT_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, verbose } => {
            let config = match load_config(config.as_ref()) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("conduit: {:#}", err);
                    return ExitCode::FAILURE;
                }
            };

            if let Err(err) = conduit_logging::init_logging(conduit_logging::LogConfig {
                app_name: "conduit",
                verbose,
            }) {
                eprintln!("conduit: {:#}", err);
                return ExitCode::FAILURE;
            }

            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to build async runtime")
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    eprintln!("conduit: {:#}", err);
                    return ExitCode::FAILURE;
                }
            };

            match runtime.block_on(serve::run(config)) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    error!("{:#}", err);
                    eprintln!("conduit: {:#}", err);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Config { config } => match load_config(config.as_ref()) {
            Ok(config) => match toml::to_string_pretty(&config) {
                Ok(rendered) => {
                    println!("{}", rendered);
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("conduit: failed to render config: {}", err);
                    ExitCode::FAILURE
                }
            },
            Err(err) => {
                eprintln!("conduit: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

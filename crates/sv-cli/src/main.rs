//! svctl - launch and supervise a local server process
//!
//! # Examples
//!
//! ```bash
//! # Start the configured server and keep it running until Ctrl-C
//! svctl run
//!
//! # Is anything listening on 8080?
//! svctl probe --port 8080
//!
//! # Kill leftovers of a previous run
//! svctl reap --port 8080 --name "open-webui serve"
//! ```

mod cli;
mod commands;
mod error;
mod logging;
mod shutdown;

#[cfg(test)]
mod tests;

use crate::{
    cli::Cli,
    commands::Commands,
    error::{CliError, CliResult},
};

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sv_config::{CONFIG_FILENAME, Config};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(hint) = e.hint() {
                eprintln!("  {hint}");
            }
            let excerpt = e.excerpt();
            if !excerpt.is_empty() {
                eprintln!();
                eprintln!("Last server output:");
                for line in excerpt {
                    eprintln!("  | {line}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let config_dir = resolve_config_dir(cli.config_dir)?;

    match cli.command {
        Commands::Probe { port } => commands::probe(port, cli.pretty),
        Commands::Reap { port, name, grace } => {
            commands::reap(port, name, grace, cli.pretty).await
        }
        Commands::Config => {
            let config = load_config(&config_dir)?;
            commands::show_config(&config);
            Ok(())
        }
        Commands::Run {
            port,
            startup_timeout,
        } => {
            let config = load_config(&config_dir)?;
            logging::setup_logging(&config.logging, &config_dir.join(&config.logging.dir))?;
            config.log_summary();
            commands::run(config, port, startup_timeout).await
        }
    }
}

fn resolve_config_dir(explicit: Option<PathBuf>) -> CliResult<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => Config::config_dir().map_err(CliError::from),
    }
}

fn load_config(config_dir: &std::path::Path) -> CliResult<Config> {
    let config = Config::load_from(&config_dir.join(CONFIG_FILENAME))?;
    config.validate()?;
    Ok(config)
}

//! keywatch CLI - Background exposure detection against a diagnosis-key server.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

mod app;
mod commands;
mod config;
mod engine;
mod logging;
mod platform;
mod scheduler;

use config::KeywatchConfig;

#[derive(Parser)]
#[command(name = "keywatch")]
#[command(about = "Background exposure detection against a diagnosis-key server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file. Defaults to keywatch.toml in the data directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// State directory override
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one detection pass now
    Run {
        /// Execution budget in seconds. Defaults to the configured budget
        #[arg(short, long)]
        budget: Option<u64>,
    },

    /// Run as a background service, executing scheduled detection passes
    Daemon,

    /// Show quota, resume cursor and last detection result
    Status,

    /// Print stored exposures as JSON
    Exposures,

    /// Reset quota and resume cursor to defaults
    Reset {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    logging::init_logging(cli.verbose, cli.quiet)?;

    let mut config =
        KeywatchConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.state_dir {
        config.state_dir = Some(dir);
    }

    match command {
        Commands::Run { budget } => commands::run::run(config, budget).await,
        Commands::Daemon => commands::daemon::daemon(config).await,
        Commands::Status => commands::status::status(config),
        Commands::Exposures => commands::exposures::exposures(config),
        Commands::Reset { yes } => commands::reset::reset(config, yes),
    }
}

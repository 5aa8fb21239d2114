// src/main.rs

mod commands;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pc_toolkit::config::AppConfig;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "pc-toolkit",
    version,
    about = "Startup programs, services, cleanup, hardware info and developer tools for Windows"
)]
struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and toggle programs that run at boot or logon
    Startup {
        #[command(subcommand)]
        command: commands::startup::StartupCommand,
    },
    /// Detect, install and snapshot developer tool versions
    Versions {
        #[command(subcommand)]
        command: commands::versions::VersionsCommand,
    },
    /// Back up and restore browser profiles
    Browser {
        #[command(subcommand)]
        command: commands::browser::BrowserCommand,
    },
    /// Show or export hardware information
    Hardware(commands::hardware::HardwareArgs),
    /// Query and control Windows services
    Services {
        #[command(subcommand)]
        command: commands::services::ServicesCommand,
    },
    /// Remove temporary files
    Cleanup(commands::cleanup::CleanupArgs),
}

fn init_logging(config: &AppConfig, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Startup { command } => commands::startup::execute(command, &config),
        Commands::Versions { command } => commands::versions::execute(command, &config),
        Commands::Browser { command } => commands::browser::execute(command, &config),
        Commands::Hardware(args) => commands::hardware::execute(&args, &config),
        Commands::Services { command } => commands::services::execute(command, &config),
        Commands::Cleanup(args) => commands::cleanup::execute(&args, &config),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// src/commands/versions.rs

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Subcommand;
use pc_toolkit::{
    config::AppConfig,
    constants::VERSION_SNAPSHOT_FILE,
    export::ExportFormat,
    orchestrator::TaskRegistry,
    versions::{
        catalog::categories, compare, export_results, find_tool, Installer, SnapshotChange,
        VersionChecker, VersionResults, VersionSnapshot, INSTALLABLE, TOOLS,
    },
    utils::command::SystemRunner,
};

use super::{export_path, print_status, resolve_format};

#[derive(Subcommand)]
pub enum VersionsCommand {
    /// Check every known tool
    Check {
        /// Print the results as JSON
        #[arg(long)]
        json: bool,
        /// Also write the results to this file
        #[arg(long)]
        export: Option<PathBuf>,
        #[arg(long)]
        format: Option<ExportFormat>,
    },
    /// Check a single tool
    Tool { name: String },
    /// List the tool catalog and what can be installed
    Catalog,
    /// Install a tool with winget, npm or Chocolatey
    Install {
        tool: String,
        /// Version to install instead of the latest
        #[arg(long)]
        version: Option<String>,
    },
    /// Uninstall a tool
    Uninstall { tool: String },
    /// Show which package managers are available
    Managers,
    /// Save installed tool versions to a snapshot file
    Snapshot {
        /// Defaults to backup.json in the configured backup directory
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Compare installed versions against a snapshot
    Compare {
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn print_results(results: &VersionResults) {
    for (category, tools) in results {
        println!("{}", category);
        for (tool, version) in tools {
            println!("  {:<22} {}", tool, version);
        }
    }
}

pub fn execute(command: VersionsCommand, config: &AppConfig) -> Result<()> {
    let checker = VersionChecker::new(Arc::new(SystemRunner), &config.timeouts);
    let snapshot_file =
        |file: Option<PathBuf>| file.unwrap_or_else(|| config.backup_dir.join(VERSION_SNAPSHOT_FILE));
    let progress = |done: usize, total: usize, tool: &str| {
        eprintln!("[{:>2}/{}] {}", done, total, tool);
    };

    match command {
        VersionsCommand::Check {
            json,
            export,
            format,
        } => {
            let results = checker.check_all(Some(&progress));
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results);
            }
            if let Some(path) = export {
                let path = export_path(&config.export_dir, &path);
                export_results(&path, &results, resolve_format(&path, format))
                    .with_context(|| format!("Failed to export to {}", path.display()))?;
                println!("Exported results to {}", path.display());
            }
        }
        VersionsCommand::Tool { name } => {
            let tool = find_tool(&name).with_context(|| format!("Unknown tool: {}", name))?;
            let outcome = checker.check_tool(tool);
            println!("{} ({}): {}", tool.name, tool.category, outcome.version);
        }
        VersionsCommand::Catalog => {
            for category in categories() {
                println!("{}", category);
                for tool in TOOLS.iter().filter(|t| t.category == category) {
                    let installable = if INSTALLABLE.contains_key(tool.name) {
                        " (installable)"
                    } else {
                        ""
                    };
                    println!("  {}{}", tool.name, installable);
                }
            }
        }
        VersionsCommand::Install { tool, version } => {
            let in_flight = TaskRegistry::new();
            let installer = Installer::new(&checker, &in_flight, &config.timeouts);
            let message = installer.install(&tool, version.as_deref(), Some(&print_status))?;
            println!("{}", message);
        }
        VersionsCommand::Uninstall { tool } => {
            let in_flight = TaskRegistry::new();
            let installer = Installer::new(&checker, &in_flight, &config.timeouts);
            println!("{}", installer.uninstall(&tool, Some(&print_status))?);
        }
        VersionsCommand::Managers => {
            let in_flight = TaskRegistry::new();
            let installer = Installer::new(&checker, &in_flight, &config.timeouts);
            for (manager, available) in installer.available_managers() {
                let status = if available { "available" } else { "not found" };
                println!("{:<12} {}", manager.to_string(), status);
            }
        }
        VersionsCommand::Snapshot { file } => {
            let file = snapshot_file(file);
            let snapshot = VersionSnapshot::from_results(&checker.check_all(Some(&progress)));
            snapshot.save(&file)?;
            println!("Saved {} tool versions to {}", snapshot.tools.len(), file.display());
        }
        VersionsCommand::Compare { file } => {
            let file = snapshot_file(file);
            let snapshot = VersionSnapshot::load(&file)
                .with_context(|| format!("Failed to read snapshot {}", file.display()))?;
            let changes = compare(&snapshot, &checker.check_all(Some(&progress)));
            if changes.is_empty() {
                println!("All tools match the snapshot from {}", snapshot.timestamp);
            }
            for change in changes {
                match change {
                    SnapshotChange::Missing { tool, expected } => {
                        println!("- {:<22} {} (no longer installed)", tool, expected)
                    }
                    SnapshotChange::Changed {
                        tool,
                        expected,
                        current,
                    } => println!("~ {:<22} {} -> {}", tool, expected, current),
                    SnapshotChange::Added { tool, current } => {
                        println!("+ {:<22} {}", tool, current)
                    }
                }
            }
        }
    }
    Ok(())
}

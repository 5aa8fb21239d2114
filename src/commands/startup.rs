// src/commands/startup.rs

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Subcommand;
use pc_toolkit::{
    config::AppConfig,
    export::ExportFormat,
    startup::{
        estimate_boot_time_improvement, LocationKind, ScanOptions, StartupManager, ToggleReport,
    },
    utils::{command::SystemRunner, fs::format_size, registry::system_registry},
};

use super::{export_path, print_progress, resolve_format};

#[derive(Subcommand)]
pub enum StartupCommand {
    /// Scan and list startup items
    List {
        /// Only show items from this location (run, approved, folder, service, task, uwp)
        #[arg(long)]
        location: Option<LocationKind>,
        /// Print the items as JSON
        #[arg(long)]
        json: bool,
    },
    /// Enable a startup item
    Enable {
        name: String,
        #[arg(long)]
        location: Option<LocationKind>,
    },
    /// Disable a startup item
    Disable {
        name: String,
        #[arg(long)]
        location: Option<LocationKind>,
        /// Allow disabling system-critical components
        #[arg(long)]
        force: bool,
    },
    /// Enable several items by name
    BulkEnable {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Disable several items by name
    BulkDisable {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(long)]
        force: bool,
    },
    /// Show counts and the estimated boot time savings
    Stats,
    /// Export the scanned items to JSON or text
    Export {
        path: PathBuf,
        #[arg(long)]
        format: Option<ExportFormat>,
    },
    /// Save the current enabled/disabled state of every item
    Backup {
        /// Defaults to the configured backup directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Re-apply the state recorded in a backup file
    Restore { file: PathBuf },
}

fn print_reports(reports: &[ToggleReport]) -> Result<()> {
    let failed = reports.iter().filter(|r| !r.success).count();
    for report in reports {
        let mark = if report.success { "OK  " } else { "FAIL" };
        println!("{} {}: {}", mark, report.name, report.message);
    }
    println!(
        "{} succeeded, {} failed",
        reports.len() - failed,
        failed
    );
    if failed > 0 {
        anyhow::bail!("{} of {} operations failed", failed, reports.len());
    }
    Ok(())
}

pub fn execute(command: StartupCommand, config: &AppConfig) -> Result<()> {
    let options = ScanOptions::from_config(&config.startup, &config.timeouts);
    let mut manager = StartupManager::new(
        Arc::from(system_registry()),
        Arc::new(SystemRunner),
        options,
    );
    manager.scan(Some(&print_progress));

    match command {
        StartupCommand::List { location, json } => {
            let items: Vec<_> = manager
                .items()
                .iter()
                .filter(|item| location.map_or(true, |l| item.location() == l))
                .collect();
            if json {
                let records: Vec<_> = items.iter().map(|item| item.to_record()).collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }
            for item in &items {
                let critical = if item.is_system_critical { " [critical]" } else { "" };
                println!(
                    "{:<8} {:<7} {:<40} {}{}",
                    item.status_label(),
                    item.impact.to_string(),
                    item.name,
                    item.source,
                    critical
                );
                if !item.command.is_empty() {
                    println!("{:17}{}", "", item.command);
                }
            }
            println!("{} items", items.len());
        }
        StartupCommand::Enable { name, location } => {
            println!("{}", manager.enable(&name, location)?);
        }
        StartupCommand::Disable {
            name,
            location,
            force,
        } => {
            println!("{}", manager.disable(&name, location, force)?);
        }
        StartupCommand::BulkEnable { names } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            print_reports(&manager.bulk_enable(&names))?;
        }
        StartupCommand::BulkDisable { names, force } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            print_reports(&manager.bulk_disable(&names, force))?;
        }
        StartupCommand::Stats => {
            let stats = manager.statistics();
            println!("Total items:      {}", stats.total);
            println!("Enabled:          {}", stats.enabled);
            println!("Disabled:         {}", stats.disabled);
            println!("High impact:      {}", stats.high_impact);
            println!("System critical:  {}", stats.system_critical);
            for (location, count) in &stats.by_location {
                println!("  {:<22} {}", location, count);
            }
            let candidates = manager
                .items()
                .iter()
                .filter(|item| item.enabled && !item.is_system_critical);
            println!(
                "Disabling all non-critical enabled items could save about {} seconds of boot time",
                estimate_boot_time_improvement(candidates)
            );
        }
        StartupCommand::Export { path, format } => {
            let path = export_path(&config.export_dir, &path);
            let format = resolve_format(&path, format);
            manager
                .export(&path, format)
                .with_context(|| format!("Failed to export to {}", path.display()))?;
            println!("Exported {} items to {}", manager.items().len(), path.display());
        }
        StartupCommand::Backup { dir } => {
            let dir = dir.unwrap_or_else(|| config.backup_dir.clone());
            let file = manager.create_backup(&dir)?;
            let size = std::fs::metadata(&file).map(|m| m.len()).unwrap_or(0);
            println!("Backup written to {} ({})", file.display(), format_size(size));
        }
        StartupCommand::Restore { file } => {
            let reports = manager
                .restore_backup(&file)
                .with_context(|| format!("Failed to restore {}", file.display()))?;
            print_reports(&reports)?;
        }
    }
    Ok(())
}

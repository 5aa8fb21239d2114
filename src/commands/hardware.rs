// src/commands/hardware.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pc_toolkit::{
    config::AppConfig, export::ExportFormat, hardware::HardwareCollector,
    utils::command::SystemRunner,
};

use super::{export_path, print_progress, resolve_format};

#[derive(Args)]
pub struct HardwareArgs {
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
    /// Write the report to this file
    #[arg(long)]
    export: Option<PathBuf>,
    #[arg(long)]
    format: Option<ExportFormat>,
}

pub fn execute(args: &HardwareArgs, config: &AppConfig) -> Result<()> {
    let runner = SystemRunner;
    let report = HardwareCollector::new(&runner, config.timeouts.system_query())
        .collect(Some(&print_progress));

    if let Some(path) = &args.export {
        let path = export_path(&config.export_dir, path);
        report
            .export(&path, resolve_format(&path, args.format))
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        println!("Hardware information exported to {}", path.display());
    } else if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.text_report());
    }
    Ok(())
}

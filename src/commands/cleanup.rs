// src/commands/cleanup.rs

use anyhow::{Context, Result};
use clap::Args;
use pc_toolkit::{
    cleanup::{component_store_cleanup, Cleaner, CleanupReport, CleanupTarget},
    config::AppConfig,
    utils::{command::SystemRunner, fs::format_size, windows::is_elevated},
};

use super::print_progress;

#[derive(Args)]
pub struct CleanupArgs {
    /// Only measure, delete nothing
    #[arg(long)]
    dry_run: bool,
    /// Limit cleanup to these targets (user-temp, windows-temp, prefetch)
    #[arg(long = "target")]
    targets: Vec<CleanupTarget>,
    /// Also run DISM component store cleanup (administrator only)
    #[arg(long)]
    dism: bool,
}

pub fn execute(args: &CleanupArgs, config: &AppConfig) -> Result<()> {
    let cleaner = Cleaner::from_config(&config.cleanup).only(&args.targets);

    let sizes = cleaner.measure();
    for size in &sizes {
        println!(
            "{:<24} {:>10} in {} files  ({})",
            size.target.label(),
            format_size(size.bytes),
            size.files,
            size.path.display()
        );
    }
    if args.dry_run {
        let total: u64 = sizes.iter().map(|s| s.bytes).sum();
        println!("{} can be freed", format_size(total));
        return Ok(());
    }

    let mut total = CleanupReport::default();
    for (target, report) in cleaner.clean(Some(&print_progress)) {
        println!(
            "{:<24} freed {:>10}, {} files deleted, {} skipped",
            target.label(),
            format_size(report.bytes_freed),
            report.files_deleted,
            report.skipped
        );
        total.merge(&report);
    }
    println!(
        "Freed {} in total; {} files were in use and skipped",
        format_size(total.bytes_freed),
        total.skipped
    );

    if args.dism {
        if !is_elevated() {
            anyhow::bail!("Component store cleanup requires administrator privileges");
        }
        let summary =
            component_store_cleanup(&SystemRunner).context("Component store cleanup failed")?;
        println!("DISM: {}", summary);
    }
    Ok(())
}

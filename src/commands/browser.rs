// src/commands/browser.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use pc_toolkit::{
    browser::{BrowserBackup, BrowserKind, BrowserLocator},
    config::AppConfig,
    utils::{command::SystemRunner, fs::format_size},
};

use super::print_status;

#[derive(Subcommand)]
pub enum BrowserCommand {
    /// Show installed browsers and their profiles
    Detect,
    /// Back up a browser's profiles
    Backup {
        browser: BrowserKind,
        /// Profiles to include; all detected profiles when omitted
        #[arg(long = "profile")]
        profiles: Vec<String>,
    },
    /// Restore a backup folder
    Restore {
        backup: PathBuf,
        /// Restore into a different browser than the one backed up
        #[arg(long)]
        into: Option<BrowserKind>,
    },
    /// List backups, newest first
    List,
    /// Delete a backup folder
    Delete { backup: PathBuf },
    /// Export bookmarks to a Netscape HTML file
    Bookmarks {
        browser: BrowserKind,
        /// Defaults to "Default", or the first profile found
        #[arg(long)]
        profile: Option<String>,
    },
}

pub fn execute(command: BrowserCommand, config: &AppConfig) -> Result<()> {
    let runner = SystemRunner;
    let mut manager = BrowserBackup::new(BrowserLocator::default(), &config.browser.backup_dir);
    if config.browser.close_before_copy {
        manager = manager.close_browser_with(&runner);
    }

    match command {
        BrowserCommand::Detect => {
            for (kind, installed) in manager.locator().detect() {
                if !installed {
                    println!("{:<16} not installed", kind.display_name());
                    continue;
                }
                let profiles = manager.locator().profiles(kind);
                println!("{:<16} {}", kind.display_name(), profiles.join(", "));
            }
        }
        BrowserCommand::Backup { browser, profiles } => {
            let selected = (!profiles.is_empty()).then_some(profiles.as_slice());
            let (dir, info) = manager
                .backup(browser, selected, Some(&print_status))
                .with_context(|| format!("Failed to back up {}", browser))?;
            println!(
                "Backed up {} of {} files from {} profile(s) to {}",
                info.copied_files,
                info.total_files,
                info.profiles.len(),
                dir.display()
            );
        }
        BrowserCommand::Restore { backup, into } => {
            let summary = manager
                .restore(&backup, into, Some(&print_status))
                .with_context(|| format!("Failed to restore {}", backup.display()))?;
            println!("Restored {} items to {}", summary.restored, summary.browser);
        }
        BrowserCommand::List => {
            let backups = manager.list();
            if backups.is_empty() {
                println!("No backups in {}", manager.root().display());
            }
            for backup in backups {
                let note = backup
                    .error
                    .map(|e| format!(" (unreadable: {})", e))
                    .unwrap_or_default();
                println!(
                    "{:<10} {:<16} {:>10}  {}{}",
                    backup.browser,
                    backup.timestamp,
                    format_size(backup.size),
                    backup.path.display(),
                    note
                );
            }
        }
        BrowserCommand::Delete { backup } => {
            manager.delete(&backup)?;
            println!("Deleted {}", backup.display());
        }
        BrowserCommand::Bookmarks { browser, profile } => {
            let profiles = manager.locator().profiles(browser);
            let profile = profile
                .or_else(|| profiles.iter().find(|p| p.as_str() == "Default").cloned())
                .or_else(|| profiles.first().cloned())
                .with_context(|| format!("No {} profiles found", browser.display_name()))?;
            let file = manager.export_bookmarks_html(browser, &profile)?;
            println!("Bookmarks exported to {}", file.display());
        }
    }
    Ok(())
}

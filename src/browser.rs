// src/browser.rs

pub mod backup;
pub mod bookmarks;
pub mod profiles;

pub use backup::{BackupListing, BrowserBackup, BrowserBackupInfo, RestoreSummary};
pub use profiles::{BrowserKind, BrowserLocator};

// src/startup.rs

pub mod item;
pub mod locations;
pub mod manager;
pub mod scanner;
pub mod toggle;

pub use item::{Backend, Impact, LocationKind, Scope, StartupItem, StartupRecord, ToggleReport};
pub use manager::{estimate_boot_time_improvement, StartupBackup, StartupExport, StartupManager, StartupStats};
pub use scanner::{estimate_impact, ScanOptions, StartupScanner};

// src/constants.rs

use std::time::Duration;

pub const APP_NAME: &str = "pc-toolkit";

// Timeouts for external commands. Every command is attempted exactly once.
pub const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const VERSION_CHECK_TOTAL_TIMEOUT: Duration = Duration::from_secs(120);
pub const PACKAGE_INSTALL_TIMEOUT: Duration = Duration::from_secs(300);
pub const SYSTEM_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
pub const FILE_INFO_TIMEOUT: Duration = Duration::from_secs(10);
pub const SERVICE_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DISM_TIMEOUT: Duration = Duration::from_secs(1800);
pub const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(25);

// Startup state encodings
pub const DISABLED_VALUE_SUFFIX: &str = "_DISABLED";
pub const DISABLED_FILE_EXTENSION: &str = "disabled";
pub const STARTUP_APPROVED_FLAG_LEN: usize = 4;

// Impact heuristics
pub const HIGH_IMPACT_FILE_SIZE: u64 = 50 * 1024 * 1024;
pub const MEDIUM_IMPACT_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const HIGH_IMPACT_BOOT_SECONDS: u64 = 8;
pub const MEDIUM_IMPACT_BOOT_SECONDS: u64 = 4;
pub const LOW_IMPACT_BOOT_SECONDS: u64 = 1;

// Persisted file formats
pub const EXPORT_FORMAT_VERSION: &str = "1.0";
pub const VERSION_SNAPSHOT_FILE: &str = "backup.json";
pub const BROWSER_BACKUP_INFO_FILE: &str = "backup_info.json";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub const READABLE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Version output is cut to this many characters
pub const MAX_VERSION_LENGTH: usize = 100;

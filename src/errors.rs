// src/errors.rs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid registry path: {0}")]
    InvalidPath(String),

    #[error("Unsupported registry hive: {0}")]
    UnsupportedHive(String),

    #[error("Registry key not found: {0}")]
    KeyNotFound(String),

    #[error("Access denied to registry key: {0}")]
    PermissionDenied(String),

    #[error("Failed to read registry value: {0}")]
    ReadValueError(String),

    #[error("Failed to set registry value: {0}")]
    SetValueError(String),

    #[error("Failed to delete registry value: {0}")]
    DeleteValueError(String),
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Permission denied running: {0}")]
    PermissionDenied(String),

    #[error("Command '{program}' timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("Command '{program}' failed (exit code {code:?}): {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Registry value '{value}' not found in '{key}'")]
    ValueNotFound { key: String, value: String },

    #[error("Startup file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("StartupApproved value '{name}' has {len} bytes, expected at least 4")]
    InvalidBinaryFormat { name: String, len: usize },

    #[error("UWP app '{0}' must be changed through Windows Settings > Apps > Startup")]
    ManagedBySettings(String),

    #[error("'{0}' is a system-critical component; confirmation is required to disable it")]
    ConfirmationRequired(String),

    #[error("Administrator privileges required to change '{0}'. Please run as administrator.")]
    ElevationRequired(String),

    #[error("Startup item not found: {0}")]
    ItemNotFound(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid startup backup: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Unknown browser: {0}")]
    UnknownBrowser(String),

    #[error("{0} is not installed")]
    BrowserNotInstalled(String),

    #[error("No profiles found for {0}")]
    NoProfiles(String),

    #[error("Backup not found: {0}")]
    BackupNotFound(PathBuf),

    #[error("Bookmarks file not found: {0}")]
    BookmarksNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid backup metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read Firefox bookmarks: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Command(#[from] CommandError),
}

#[derive(Error, Debug)]
pub enum VersionError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0} cannot be installed automatically")]
    NotInstallable(String),

    #[error("{0} is already being installed")]
    InstallInProgress(String),

    #[error("No package manager available to handle {0}")]
    NoPackageManager(String),

    #[error("Failed to {action} {tool}: {reason}")]
    PackageManagerFailed {
        action: &'static str,
        tool: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service not found: {0}")]
    NotFound(String),

    #[error("Unrecognized start mode: {0}")]
    InvalidStartMode(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

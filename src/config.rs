// src/config.rs

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        APP_NAME, PACKAGE_INSTALL_TIMEOUT, SYSTEM_QUERY_TIMEOUT, VERSION_CHECK_TOTAL_TIMEOUT,
        VERSION_PROBE_TIMEOUT,
    },
    errors::ConfigError,
};

/// Returns the config file path: `<config dir>/pc-toolkit/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME).join("config.toml"))
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Settings read from `config.toml`. Every field has a default, so a partial
/// or missing file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub log_level: String,
    /// Where startup backups and the tool version snapshot are written.
    pub backup_dir: PathBuf,
    /// Default directory for report exports.
    pub export_dir: PathBuf,
    pub browser: BrowserConfig,
    pub startup: StartupConfig,
    pub cleanup: CleanupConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub backup_dir: PathBuf,
    /// Close the browser with `taskkill` before backing up or restoring.
    pub close_before_copy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    pub scan_services: bool,
    pub scan_scheduled_tasks: bool,
    pub scan_uwp_apps: bool,
    /// Override for `%APPDATA%\...\Startup`.
    pub user_startup_folder: Option<PathBuf>,
    /// Override for `%ALLUSERSPROFILE%\...\Startup`.
    pub common_startup_folder: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub user_temp: bool,
    pub windows_temp: bool,
    pub prefetch: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub version_probe_secs: u64,
    pub version_check_total_secs: u64,
    pub install_secs: u64,
    pub system_query_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            backup_dir: data_dir().join("backups"),
            export_dir: PathBuf::from("."),
            browser: BrowserConfig::default(),
            startup: StartupConfig::default(),
            cleanup: CleanupConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            backup_dir: data_dir().join("browser_backups"),
            close_before_copy: false,
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            scan_services: true,
            scan_scheduled_tasks: true,
            scan_uwp_apps: true,
            user_startup_folder: None,
            common_startup_folder: None,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            user_temp: true,
            windows_temp: true,
            prefetch: true,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            version_probe_secs: VERSION_PROBE_TIMEOUT.as_secs(),
            version_check_total_secs: VERSION_CHECK_TOTAL_TIMEOUT.as_secs(),
            install_secs: PACKAGE_INSTALL_TIMEOUT.as_secs(),
            system_query_secs: SYSTEM_QUERY_TIMEOUT.as_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn version_probe(&self) -> Duration {
        Duration::from_secs(self.version_probe_secs.max(1))
    }

    pub fn version_check_total(&self) -> Duration {
        Duration::from_secs(self.version_check_total_secs.max(1))
    }

    pub fn install(&self) -> Duration {
        Duration::from_secs(self.install_secs.max(1))
    }

    pub fn system_query(&self) -> Duration {
        Duration::from_secs(self.system_query_secs.max(1))
    }
}

impl AppConfig {
    /// Parses a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the configuration.
    ///
    /// An explicit path must exist. The default location is optional and falls
    /// back to built-in defaults when the file is absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"

[timeouts]
version_probe_secs = 9

[startup]
scan_uwp_apps = false
"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.timeouts.version_probe(), Duration::from_secs(9));
        assert_eq!(
            config.timeouts.install(),
            Duration::from_secs(PACKAGE_INSTALL_TIMEOUT.as_secs())
        );
        assert!(!config.startup.scan_uwp_apps);
        assert!(config.startup.scan_services);
        assert!(config.cleanup.prefetch);
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_level = [").unwrap();
        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_zero_timeouts_are_clamped() {
        let timeouts = TimeoutConfig {
            version_probe_secs: 0,
            ..TimeoutConfig::default()
        };
        assert_eq!(timeouts.version_probe(), Duration::from_secs(1));
    }
}

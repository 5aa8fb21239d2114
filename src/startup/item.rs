// src/startup/item.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    constants::{HIGH_IMPACT_BOOT_SECONDS, LOW_IMPACT_BOOT_SECONDS, MEDIUM_IMPACT_BOOT_SECONDS},
    utils::registry::{Hive, RegistryPath},
};

/// The class of "run at logon" storage an item was found in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum LocationKind {
    #[strum(to_string = "Registry Run", serialize = "run")]
    #[serde(rename = "Registry Run")]
    RegistryRun,
    #[strum(to_string = "Startup Approved", serialize = "approved")]
    #[serde(rename = "Startup Approved")]
    StartupApproved,
    #[strum(to_string = "Startup Folder", serialize = "folder")]
    #[serde(rename = "Startup Folder")]
    StartupFolder,
    #[strum(to_string = "Windows Service", serialize = "service")]
    #[serde(rename = "Windows Service")]
    Service,
    #[strum(to_string = "Scheduled Task", serialize = "task")]
    #[serde(rename = "Scheduled Task")]
    ScheduledTask,
    #[strum(to_string = "Microsoft Store App", serialize = "uwp")]
    #[serde(rename = "Microsoft Store App")]
    Uwp,
}

/// Whether changing an item affects only the current user or the whole machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Scope {
    User,
    System,
}

impl From<Hive> for Scope {
    fn from(hive: Hive) -> Self {
        match hive {
            Hive::CurrentUser => Scope::User,
            _ => Scope::System,
        }
    }
}

/// Heuristic estimate of how much an item slows down boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Impact {
    /// Seconds of boot time attributed to an item with this impact.
    pub fn boot_seconds(&self) -> u64 {
        match self {
            Impact::High => HIGH_IMPACT_BOOT_SECONDS,
            Impact::Medium => MEDIUM_IMPACT_BOOT_SECONDS,
            Impact::Low => LOW_IMPACT_BOOT_SECONDS,
            Impact::Unknown => 0,
        }
    }
}

/// Where an item's enabled/disabled state physically lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// A value under a `Run`-style key. Disabled values carry the `_DISABLED`
    /// suffix; `stored_name` is the name currently present in the registry.
    RegistryRun {
        path: RegistryPath,
        value_name: String,
        stored_name: String,
    },
    /// A binary flag under `Explorer\StartupApproved`, paired with the `Run`
    /// key that holds the command.
    StartupApproved {
        approved_path: RegistryPath,
        run_path: RegistryPath,
        value_name: String,
    },
    /// A file in a startup folder; disabled files end in `.disabled`.
    StartupFolder { file: PathBuf },
    Service { service_name: String },
    ScheduledTask { task_path: String },
    /// Store apps are toggled from Windows Settings only.
    Uwp { package_name: String, app_id: String },
}

impl Backend {
    pub fn location(&self) -> LocationKind {
        match self {
            Backend::RegistryRun { .. } => LocationKind::RegistryRun,
            Backend::StartupApproved { .. } => LocationKind::StartupApproved,
            Backend::StartupFolder { .. } => LocationKind::StartupFolder,
            Backend::Service { .. } => LocationKind::Service,
            Backend::ScheduledTask { .. } => LocationKind::ScheduledTask,
            Backend::Uwp { .. } => LocationKind::Uwp,
        }
    }

    /// Human readable storage location, e.g. the registry key or task path.
    pub fn locator(&self) -> String {
        match self {
            Backend::RegistryRun { path, .. } => path.to_string(),
            Backend::StartupApproved { approved_path, .. } => approved_path.to_string(),
            Backend::StartupFolder { file } => file.display().to_string(),
            Backend::Service { service_name } => service_name.clone(),
            Backend::ScheduledTask { task_path } => task_path.clone(),
            Backend::Uwp { app_id, .. } => app_id.clone(),
        }
    }
}

/// A single program that runs at boot or logon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupItem {
    pub name: String,
    /// Full command line as stored, when the location has one.
    pub command: String,
    /// Executable (or shortcut) path extracted from the command.
    pub path: String,
    /// Descriptive source label such as `Registry (User Once)`.
    pub source: String,
    pub scope: Scope,
    pub enabled: bool,
    pub publisher: String,
    pub description: String,
    pub impact: Impact,
    pub is_system_critical: bool,
    pub last_modified: Option<String>,
    pub startup_delay: u32,
    pub backend: Backend,
}

impl StartupItem {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        scope: Scope,
        backend: Backend,
    ) -> Self {
        Self {
            name: name.into(),
            command: String::new(),
            path: String::new(),
            source: source.into(),
            scope,
            enabled: true,
            publisher: String::new(),
            description: String::new(),
            impact: Impact::Unknown,
            is_system_critical: false,
            last_modified: None,
            startup_delay: 0,
            backend,
        }
    }

    pub fn location(&self) -> LocationKind {
        self.backend.location()
    }

    pub fn status_label(&self) -> &'static str {
        if self.enabled {
            "Enabled"
        } else {
            "Disabled"
        }
    }

    pub fn to_record(&self) -> StartupRecord {
        StartupRecord {
            name: self.name.clone(),
            path: self.path.clone(),
            command: self.command.clone(),
            location: self.location(),
            source: self.source.clone(),
            scope: self.scope,
            enabled: self.enabled,
            publisher: self.publisher.clone(),
            description: self.description.clone(),
            impact: self.impact,
            startup_delay: self.startup_delay,
            last_modified: self.last_modified.clone().unwrap_or_default(),
            is_system_critical: self.is_system_critical,
            registry_key: match &self.backend {
                Backend::RegistryRun { path, .. } => Some(path.to_string()),
                Backend::StartupApproved { approved_path, .. } => Some(approved_path.to_string()),
                _ => None,
            },
        }
    }
}

/// Flat, serializable view of a [`StartupItem`] used in exports and backups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupRecord {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub command: String,
    pub location: LocationKind,
    #[serde(default)]
    pub source: String,
    pub scope: Scope,
    pub enabled: bool,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub impact: Impact,
    #[serde(default)]
    pub startup_delay: u32,
    #[serde(default)]
    pub last_modified: String,
    #[serde(default)]
    pub is_system_critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_key: Option<String>,
}

/// Outcome of one enable/disable request within a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleReport {
    pub name: String,
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_location_labels() {
        assert_eq!(LocationKind::RegistryRun.to_string(), "Registry Run");
        assert_eq!(LocationKind::Uwp.to_string(), "Microsoft Store App");
        assert_eq!(LocationKind::from_str("service").unwrap(), LocationKind::Service);
        assert_eq!(
            LocationKind::from_str("startup folder").unwrap(),
            LocationKind::StartupFolder
        );
    }

    #[test]
    fn test_record_serializes_display_names() {
        let item = StartupItem::new(
            "Updater",
            "Registry (User)",
            Scope::User,
            Backend::RegistryRun {
                path: RegistryPath::new(Hive::CurrentUser, "Software\\Run"),
                value_name: "Updater".into(),
                stored_name: "Updater".into(),
            },
        );
        let json = serde_json::to_value(item.to_record()).unwrap();
        assert_eq!(json["location"], "Registry Run");
        assert_eq!(json["impact"], "Unknown");
        assert_eq!(json["registry_key"], "HKEY_CURRENT_USER\\Software\\Run");
    }
}

// src/startup/manager.rs

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Local;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::{
    item::{Backend, Impact, LocationKind, Scope, StartupItem, StartupRecord, ToggleReport},
    scanner::{ScanOptions, StartupScanner},
    toggle::{set_enabled, ToggleContext},
};
use crate::{
    errors::StartupError,
    export::{file_timestamp, iso_timestamp, readable_now, write_json, write_text, ExportFormat, ExportInfo},
    orchestrator::ProgressCallback,
    utils::{command::CommandRunner, registry::RegistryStore, windows::is_elevated},
};

/// Contents of a `startup_backup_*.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupBackup {
    pub timestamp: String,
    pub items: Vec<StartupRecord>,
}

/// Contents of a JSON startup export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupExport {
    pub export_info: ExportInfo,
    pub startup_items: Vec<StartupRecord>,
}

/// Summary counts over the scanned items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartupStats {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub high_impact: usize,
    pub system_critical: usize,
    pub by_location: IndexMap<String, usize>,
}

/// Seconds of boot time saved by disabling `items`.
pub fn estimate_boot_time_improvement<'a>(items: impl IntoIterator<Item = &'a StartupItem>) -> u64 {
    items.into_iter().map(|item| item.impact.boot_seconds()).sum()
}

/// Holds the latest scan and applies enable/disable requests to it.
pub struct StartupManager {
    registry: Arc<dyn RegistryStore>,
    runner: Arc<dyn CommandRunner>,
    options: ScanOptions,
    elevated: bool,
    items: Vec<StartupItem>,
}

impl StartupManager {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        runner: Arc<dyn CommandRunner>,
        options: ScanOptions,
    ) -> Self {
        Self {
            registry,
            runner,
            options,
            elevated: is_elevated(),
            items: Vec::new(),
        }
    }

    /// Overrides the detected administrator state.
    pub fn with_elevation(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    /// Rebuilds the item list from scratch.
    pub fn scan(&mut self, progress: Option<ProgressCallback<'_>>) -> &[StartupItem] {
        let scanner = StartupScanner::new(
            self.registry.as_ref(),
            self.runner.as_ref(),
            self.options.clone(),
        );
        self.items = scanner.scan(progress);
        &self.items
    }

    pub fn items(&self) -> &[StartupItem] {
        &self.items
    }

    /// Finds an item by case-insensitive name, optionally restricted to one location class.
    pub fn find(&self, name: &str, location: Option<LocationKind>) -> Option<usize> {
        self.items.iter().position(|item| {
            item.name.eq_ignore_ascii_case(name)
                && location.map_or(true, |kind| item.location() == kind)
        })
    }

    fn check_allowed(
        &self,
        item: &StartupItem,
        enable: bool,
        acknowledge_critical: bool,
    ) -> Result<(), StartupError> {
        if matches!(item.backend, Backend::Uwp { .. }) {
            return Err(StartupError::ManagedBySettings(item.name.clone()));
        }
        if item.scope == Scope::System && !self.elevated {
            return Err(StartupError::ElevationRequired(item.name.clone()));
        }
        if !enable && item.is_system_critical && !acknowledge_critical {
            return Err(StartupError::ConfirmationRequired(item.name.clone()));
        }
        Ok(())
    }

    /// Enables or disables the item at `index`.
    ///
    /// Disabling a system-critical item fails with `ConfirmationRequired`
    /// unless `acknowledge_critical` is set.
    pub fn set_enabled(
        &mut self,
        index: usize,
        enable: bool,
        acknowledge_critical: bool,
    ) -> Result<String, StartupError> {
        let item = self
            .items
            .get(index)
            .ok_or_else(|| StartupError::ItemNotFound(format!("#{}", index)))?;
        self.check_allowed(item, enable, acknowledge_critical)?;

        let ctx = ToggleContext {
            registry: self.registry.as_ref(),
            runner: self.runner.as_ref(),
        };
        let item = &mut self.items[index];
        match set_enabled(ctx, item, enable) {
            Ok(message) => {
                info!("{} -> {}", item.name, message);
                Ok(message)
            }
            Err(e) => {
                error!("{} -> failed to change startup state: {}", item.name, e);
                Err(e)
            }
        }
    }

    pub fn enable(&mut self, name: &str, location: Option<LocationKind>) -> Result<String, StartupError> {
        let index = self
            .find(name, location)
            .ok_or_else(|| StartupError::ItemNotFound(name.to_string()))?;
        self.set_enabled(index, true, false)
    }

    pub fn disable(
        &mut self,
        name: &str,
        location: Option<LocationKind>,
        acknowledge_critical: bool,
    ) -> Result<String, StartupError> {
        let index = self
            .find(name, location)
            .ok_or_else(|| StartupError::ItemNotFound(name.to_string()))?;
        self.set_enabled(index, false, acknowledge_critical)
    }

    fn bulk(&mut self, names: &[&str], enable: bool, acknowledge_critical: bool) -> Vec<ToggleReport> {
        names
            .iter()
            .map(|name| {
                let result = match self.find(name, None) {
                    Some(index) => self.set_enabled(index, enable, acknowledge_critical),
                    None => Err(StartupError::ItemNotFound(name.to_string())),
                };
                report(name, result)
            })
            .collect()
    }

    pub fn bulk_enable(&mut self, names: &[&str]) -> Vec<ToggleReport> {
        self.bulk(names, true, false)
    }

    pub fn bulk_disable(&mut self, names: &[&str], acknowledge_critical: bool) -> Vec<ToggleReport> {
        self.bulk(names, false, acknowledge_critical)
    }

    pub fn statistics(&self) -> StartupStats {
        let mut stats = StartupStats {
            total: self.items.len(),
            ..StartupStats::default()
        };
        for item in &self.items {
            if item.enabled {
                stats.enabled += 1;
            } else {
                stats.disabled += 1;
            }
            if item.impact == Impact::High {
                stats.high_impact += 1;
            }
            if item.is_system_critical {
                stats.system_critical += 1;
            }
            *stats
                .by_location
                .entry(item.location().to_string())
                .or_default() += 1;
        }
        stats
    }

    fn records(&self) -> Vec<StartupRecord> {
        self.items.iter().map(StartupItem::to_record).collect()
    }

    pub fn export(&self, path: &Path, format: ExportFormat) -> Result<(), StartupError> {
        match format {
            ExportFormat::Json => {
                let export = StartupExport {
                    export_info: ExportInfo::now(Some(self.items.len())),
                    startup_items: self.records(),
                };
                write_json(path, &export)?;
            }
            ExportFormat::Text => write_text(path, &self.text_report())?,
        }
        info!("Startup configuration exported to {}", path.display());
        Ok(())
    }

    /// Plain-text report with items grouped by source label.
    pub fn text_report(&self) -> String {
        let mut groups: IndexMap<&str, Vec<&StartupItem>> = IndexMap::new();
        for item in &self.items {
            groups.entry(item.source.as_str()).or_default().push(item);
        }

        let mut out = String::new();
        let _ = writeln!(out, "STARTUP PROGRAMS REPORT");
        let _ = writeln!(out, "{}", "=".repeat(50));
        let _ = writeln!(out, "Generated: {}", readable_now());
        let _ = writeln!(out, "Total Items: {}\n", self.items.len());

        for (source, items) in groups {
            let _ = writeln!(out, "{}", source.to_uppercase());
            let _ = writeln!(out, "{}", "-".repeat(30));
            for item in items {
                let _ = writeln!(out, "Name: {}", item.name);
                let _ = writeln!(out, "Status: {}", item.status_label());
                let _ = writeln!(out, "Impact: {}", item.impact);
                let _ = writeln!(out, "Path: {}", item.path);
                if !item.publisher.is_empty() {
                    let _ = writeln!(out, "Publisher: {}", item.publisher);
                }
                if !item.description.is_empty() {
                    let _ = writeln!(out, "Description: {}", item.description);
                }
                let _ = writeln!(
                    out,
                    "System Critical: {}\n",
                    if item.is_system_critical { "Yes" } else { "No" }
                );
            }
            out.push('\n');
        }
        out
    }

    /// Writes `startup_backup_<timestamp>.json` into `dir` and returns its path.
    pub fn create_backup(&self, dir: &Path) -> Result<PathBuf, StartupError> {
        let now = Local::now();
        let backup = StartupBackup {
            timestamp: iso_timestamp(&now),
            items: self.records(),
        };
        let path = dir.join(format!("startup_backup_{}.json", file_timestamp(&now)));
        write_json(&path, &backup)?;
        info!("Startup backup created: {}", path.display());
        Ok(path)
    }

    /// Re-applies the enabled flags recorded in a backup to the current scan.
    ///
    /// Items are matched by name and location class. Items already in the
    /// recorded state are reported as successful without changes.
    pub fn restore_backup(&mut self, file: &Path) -> Result<Vec<ToggleReport>, StartupError> {
        let backup: StartupBackup = serde_json::from_str(&fs::read_to_string(file)?)?;
        info!(
            "Restoring {} startup items from {}",
            backup.items.len(),
            file.display()
        );

        let mut reports = Vec::with_capacity(backup.items.len());
        for record in &backup.items {
            let index = self
                .items
                .iter()
                .position(|item| item.name == record.name && item.source == record.source)
                .or_else(|| self.find(&record.name, Some(record.location)));

            let result = match index {
                None => Err(StartupError::ItemNotFound(record.name.clone())),
                Some(index) if self.items[index].enabled == record.enabled => {
                    debug!("{} -> already {}", record.name, self.items[index].status_label());
                    Ok(format!("{} already {}", record.name, self.items[index].status_label()))
                }
                Some(index) => self.set_enabled(index, record.enabled, true),
            };
            if let Err(e) = &result {
                warn!("{} -> could not restore: {}", record.name, e);
            }
            reports.push(report(&record.name, result));
        }
        Ok(reports)
    }
}

fn report(name: &str, result: Result<String, StartupError>) -> ToggleReport {
    match result {
        Ok(message) => ToggleReport {
            name: name.to_string(),
            success: true,
            message,
        },
        Err(e) => ToggleReport {
            name: name.to_string(),
            success: false,
            message: e.to_string(),
        },
    }
}

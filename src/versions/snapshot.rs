// src/versions/snapshot.rs

use std::{fmt::Write as _, fs, path::Path};

use chrono::Local;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::checker::{is_installed_status, VersionResults};
use crate::{
    constants::EXPORT_FORMAT_VERSION,
    errors::VersionError,
    export::{iso_timestamp, write_json, write_text, ExportFormat},
};

/// Installed tools and their versions at one point in time (`backup.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub format_version: String,
    pub timestamp: String,
    pub tools: IndexMap<String, String>,
}

impl VersionSnapshot {
    /// Keeps only tools that were found installed.
    pub fn from_results(results: &VersionResults) -> Self {
        let tools = results
            .values()
            .flat_map(|tools| tools.iter())
            .filter(|(_, version)| is_installed_status(version))
            .map(|(name, version)| (name.clone(), version.clone()))
            .collect();
        Self {
            format_version: EXPORT_FORMAT_VERSION.to_string(),
            timestamp: iso_timestamp(&Local::now()),
            tools,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), VersionError> {
        write_json(path, self)?;
        info!("Saved {} tool versions to {}", self.tools.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, VersionError> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// Difference between a snapshot and a fresh check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum SnapshotChange {
    Missing { tool: String, expected: String },
    Changed { tool: String, expected: String, current: String },
    Added { tool: String, current: String },
}

/// Lists snapshot tools that are now missing or at another version, and
/// tools installed since the snapshot.
pub fn compare(snapshot: &VersionSnapshot, results: &VersionResults) -> Vec<SnapshotChange> {
    let current = VersionSnapshot::from_results(results).tools;
    let mut changes = Vec::new();
    for (tool, expected) in &snapshot.tools {
        match current.get(tool) {
            None => changes.push(SnapshotChange::Missing {
                tool: tool.clone(),
                expected: expected.clone(),
            }),
            Some(now) if now != expected => changes.push(SnapshotChange::Changed {
                tool: tool.clone(),
                expected: expected.clone(),
                current: now.clone(),
            }),
            Some(_) => {}
        }
    }
    for (tool, now) in &current {
        if !snapshot.tools.contains_key(tool) {
            changes.push(SnapshotChange::Added {
                tool: tool.clone(),
                current: now.clone(),
            });
        }
    }
    changes
}

pub fn text_report(results: &VersionResults) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Programming Tools Version Report");
    let _ = writeln!(out, "{}\n", "=".repeat(40));
    for (category, tools) in results {
        let _ = writeln!(out, "{}:", category);
        let _ = writeln!(out, "{}", "-".repeat(category.len()));
        for (tool, version) in tools {
            let _ = writeln!(out, "  {}: {}", tool, version);
        }
        out.push('\n');
    }
    out
}

pub fn export_results(
    path: &Path,
    results: &VersionResults,
    format: ExportFormat,
) -> Result<(), VersionError> {
    match format {
        ExportFormat::Json => write_json(path, results)?,
        ExportFormat::Text => write_text(path, &text_report(results))?,
    }
    info!("Exported version report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::checker::{STATUS_NOT_FOUND, STATUS_TIMEOUT};

    fn results(entries: &[(&str, &str, &str)]) -> VersionResults {
        let mut results = VersionResults::new();
        for (category, tool, version) in entries {
            results
                .entry(category.to_string())
                .or_default()
                .insert(tool.to_string(), version.to_string());
        }
        results
    }

    #[test]
    fn test_snapshot_round_trip() {
        let checked = results(&[
            ("Languages", "Python", "Python 3.12.1"),
            ("Languages", "Ruby", STATUS_NOT_FOUND),
            ("Version Control", "Git", "git version 2.43.0"),
            ("Databases", "MySQL", STATUS_TIMEOUT),
        ]);
        let snapshot = VersionSnapshot::from_results(&checked);
        assert_eq!(
            snapshot.tools.keys().collect::<Vec<_>>(),
            vec!["Python", "Git"]
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        snapshot.save(&path).unwrap();
        let loaded = VersionSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.format_version, "1.0");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(VersionSnapshot::load(&path), Err(VersionError::Json(_))));
        assert!(matches!(
            VersionSnapshot::load(&dir.path().join("absent.json")),
            Err(VersionError::Io(_))
        ));
    }

    #[test]
    fn test_compare_lists_changes() {
        let before = VersionSnapshot::from_results(&results(&[
            ("Languages", "Python", "Python 3.11.0"),
            ("Languages", "Go", "go version go1.22"),
            ("Version Control", "Git", "git version 2.43.0"),
        ]));
        let now = results(&[
            ("Languages", "Python", "Python 3.12.1"),
            ("Languages", "Go", STATUS_NOT_FOUND),
            ("Version Control", "Git", "git version 2.43.0"),
            ("Package Managers", "Cargo", "cargo 1.79.0"),
        ]);
        assert_eq!(
            compare(&before, &now),
            vec![
                SnapshotChange::Changed {
                    tool: "Python".into(),
                    expected: "Python 3.11.0".into(),
                    current: "Python 3.12.1".into(),
                },
                SnapshotChange::Missing {
                    tool: "Go".into(),
                    expected: "go version go1.22".into(),
                },
                SnapshotChange::Added {
                    tool: "Cargo".into(),
                    current: "cargo 1.79.0".into(),
                },
            ]
        );
    }

    #[test]
    fn test_text_report_layout() {
        let report = text_report(&results(&[("Languages", "Go", "go version go1.22")]));
        assert!(report.starts_with("Programming Tools Version Report\n"));
        assert!(report.contains("Languages:\n---------\n  Go: go version go1.22\n"));
    }
}

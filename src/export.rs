// src/export.rs

use std::{fs, io, path::Path};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::constants::{EXPORT_FORMAT_VERSION, READABLE_DATE_FORMAT, TIMESTAMP_FORMAT};

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    #[default]
    Json,
    #[strum(serialize = "text", serialize = "txt")]
    Text,
}

impl ExportFormat {
    /// Picks the format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => ExportFormat::Text,
            _ => ExportFormat::Json,
        }
    }
}

/// Header written at the top of JSON exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub timestamp: String,
    pub date_readable: String,
    pub format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<usize>,
}

impl ExportInfo {
    pub fn now(total_items: Option<usize>) -> Self {
        let now = Local::now();
        Self {
            timestamp: iso_timestamp(&now),
            date_readable: now.format(READABLE_DATE_FORMAT).to_string(),
            format_version: EXPORT_FORMAT_VERSION.to_string(),
            total_items,
        }
    }
}

/// Local time as `YYYY-mm-ddTHH:MM:SS.ffffff`.
pub fn iso_timestamp(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Local time as `YYYYmmdd_HHMMSS`, used in backup file and folder names.
pub fn file_timestamp(time: &DateTime<Local>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

pub fn readable_now() -> String {
    Local::now().format(READABLE_DATE_FORMAT).to_string()
}

/// Writes `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
}

pub fn write_text(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}

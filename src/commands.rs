// src/commands.rs

pub mod browser;
pub mod cleanup;
pub mod hardware;
pub mod services;
pub mod startup;
pub mod versions;

use std::path::{Path, PathBuf};

use pc_toolkit::export::ExportFormat;

/// Prints a progress line to stderr so stdout stays clean for reports.
pub fn print_progress(message: &str, percent: u8) {
    eprintln!("[{:>3}%] {}", percent, message);
}

pub fn print_status(message: &str) {
    eprintln!("  {}", message);
}

/// An explicit format wins; otherwise the file extension decides.
pub fn resolve_format(path: &Path, format: Option<ExportFormat>) -> ExportFormat {
    format.unwrap_or_else(|| ExportFormat::from_path(path))
}

/// Places a bare file name inside the configured export directory.
pub fn export_path(export_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || path.parent().is_some_and(|p| !p.as_os_str().is_empty()) {
        path.to_path_buf()
    } else {
        export_dir.join(path)
    }
}

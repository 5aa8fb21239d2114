// src/versions.rs

pub mod catalog;
pub mod checker;
pub mod installer;
pub mod snapshot;

pub use catalog::{find_installable, find_tool, InstallSpec, Probe, ToolSpec, INSTALLABLE, TOOLS};
pub use checker::{extract_version, FallbackRoots, ProbeOutcome, VersionChecker, VersionResults};
pub use installer::{Installer, PackageManager};
pub use snapshot::{compare, export_results, SnapshotChange, VersionSnapshot};

// src/cleanup.rs

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    config::CleanupConfig,
    constants::DISM_TIMEOUT,
    errors::CommandError,
    orchestrator::ProgressCallback,
    utils::{
        command::CommandRunner,
        fs::{directory_size, file_count},
        windows::system_root,
    },
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupTarget {
    UserTemp,
    WindowsTemp,
    Prefetch,
}

impl CleanupTarget {
    pub fn label(&self) -> &'static str {
        match self {
            CleanupTarget::UserTemp => "User temporary files",
            CleanupTarget::WindowsTemp => "Windows temporary files",
            CleanupTarget::Prefetch => "Prefetch files",
        }
    }

    pub fn default_path(&self) -> PathBuf {
        match self {
            CleanupTarget::UserTemp => std::env::temp_dir(),
            CleanupTarget::WindowsTemp => system_root().join("Temp"),
            CleanupTarget::Prefetch => system_root().join("Prefetch"),
        }
    }

    fn enabled_in(&self, config: &CleanupConfig) -> bool {
        match self {
            CleanupTarget::UserTemp => config.user_temp,
            CleanupTarget::WindowsTemp => config.windows_temp,
            CleanupTarget::Prefetch => config.prefetch,
        }
    }
}

/// Size of a cleanup location before anything is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub target: CleanupTarget,
    pub path: PathBuf,
    pub bytes: u64,
    pub files: usize,
}

/// What a cleanup pass removed from one location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub path: PathBuf,
    pub files_deleted: usize,
    pub dirs_deleted: usize,
    pub bytes_freed: u64,
    /// Entries that could not be removed, usually because they are in use.
    pub skipped: usize,
}

impl CleanupReport {
    pub fn merge(&mut self, other: &CleanupReport) {
        self.files_deleted += other.files_deleted;
        self.dirs_deleted += other.dirs_deleted;
        self.bytes_freed += other.bytes_freed;
        self.skipped += other.skipped;
    }
}

/// Deletes the contents of `dir`, keeping `dir` itself.
///
/// Files that cannot be removed are counted and left behind, along with the
/// directories containing them.
pub fn clean_directory(dir: &Path) -> CleanupReport {
    let mut report = CleanupReport {
        path: dir.to_path_buf(),
        ..CleanupReport::default()
    };
    if !dir.is_dir() {
        debug!("{} -> not present, nothing to clean", dir.display());
        return report;
    }

    for entry in WalkDir::new(dir).min_depth(1).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                report.skipped += 1;
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_dir() {
            match fs::remove_dir(path) {
                Ok(()) => report.dirs_deleted += 1,
                // Still holds skipped files
                Err(e) => debug!("Keeping {}: {}", path.display(), e),
            }
        } else {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(path) {
                Ok(()) => {
                    report.files_deleted += 1;
                    report.bytes_freed += size;
                }
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    report.skipped += 1;
                }
            }
        }
    }

    info!(
        "{} -> removed {} files, {} folders, skipped {}",
        dir.display(),
        report.files_deleted,
        report.dirs_deleted,
        report.skipped
    );
    report
}

/// Temp and Prefetch cleanup over a configured set of locations.
pub struct Cleaner {
    locations: Vec<(CleanupTarget, PathBuf)>,
}

impl Cleaner {
    pub fn new(locations: Vec<(CleanupTarget, PathBuf)>) -> Self {
        Self { locations }
    }

    /// The default location of every target enabled in `config`.
    pub fn from_config(config: &CleanupConfig) -> Self {
        Self::new(
            CleanupTarget::iter()
                .filter(|target| target.enabled_in(config))
                .map(|target| (target, target.default_path()))
                .collect(),
        )
    }

    /// Restricts the cleaner to `targets`.
    pub fn only(mut self, targets: &[CleanupTarget]) -> Self {
        if !targets.is_empty() {
            self.locations.retain(|(target, _)| targets.contains(target));
        }
        self
    }

    pub fn locations(&self) -> &[(CleanupTarget, PathBuf)] {
        &self.locations
    }

    pub fn measure(&self) -> Vec<TargetSize> {
        self.locations
            .iter()
            .map(|(target, path)| TargetSize {
                target: *target,
                path: path.clone(),
                bytes: directory_size(path),
                files: file_count(path),
            })
            .collect()
    }

    pub fn clean(&self, progress: Option<ProgressCallback<'_>>) -> Vec<(CleanupTarget, CleanupReport)> {
        let total = self.locations.len().max(1);
        let mut reports = Vec::with_capacity(self.locations.len());
        for (i, (target, path)) in self.locations.iter().enumerate() {
            if let Some(callback) = progress {
                callback(
                    &format!("Cleaning {}...", target.label().to_lowercase()),
                    (i * 100 / total) as u8,
                );
            }
            reports.push((*target, clean_directory(path)));
        }
        if let Some(callback) = progress {
            callback("Cleanup complete", 100);
        }
        reports
    }
}

/// Runs `dism /online /cleanup-image /startcomponentcleanup`.
///
/// Requires administrator rights and can take many minutes.
pub fn component_store_cleanup(runner: &dyn CommandRunner) -> Result<String, CommandError> {
    info!("Starting component store cleanup");
    let output = runner
        .run(
            "dism",
            &["/online", "/cleanup-image", "/startcomponentcleanup"],
            DISM_TIMEOUT,
        )
        .map_err(|e| {
            warn!("DISM failed to run: {}", e);
            e
        })?
        .into_result("dism")?;
    let summary = output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("The operation completed successfully.")
        .to_string();
    info!("Component store cleanup finished: {}", summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::command::testing::ScriptedRunner;

    fn populate(dir: &Path) {
        fs::create_dir_all(dir.join("nested/deeper")).unwrap();
        fs::write(dir.join("a.tmp"), [0u8; 100]).unwrap();
        fs::write(dir.join("nested/b.log"), [0u8; 20]).unwrap();
        fs::write(dir.join("nested/deeper/c.dat"), [0u8; 5]).unwrap();
    }

    #[test]
    fn test_clean_directory_removes_contents_only() {
        let root = tempfile::tempdir().unwrap();
        populate(root.path());

        let report = clean_directory(root.path());
        assert_eq!(report.files_deleted, 3);
        assert_eq!(report.dirs_deleted, 2);
        assert_eq!(report.bytes_freed, 125);
        assert_eq!(report.skipped, 0);
        assert!(root.path().is_dir());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_directory_is_empty_report() {
        let root = tempfile::tempdir().unwrap();
        let report = clean_directory(&root.path().join("missing"));
        assert_eq!(
            report,
            CleanupReport {
                path: root.path().join("missing"),
                ..CleanupReport::default()
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_undeletable_files_are_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        populate(root.path());
        let locked = root.path().join("nested");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let report = clean_directory(root.path());
        // Running as root ignores directory permissions and removes `nested`
        if locked.exists() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        }

        if report.skipped > 0 {
            assert_eq!(report.skipped, 1);
            assert!(locked.join("b.log").exists());
            assert!(!root.path().join("a.tmp").exists());
        }
    }

    #[test]
    fn test_measure_and_clean_configured_targets() {
        let user = tempfile::tempdir().unwrap();
        let prefetch = tempfile::tempdir().unwrap();
        populate(user.path());
        fs::write(prefetch.path().join("APP.EXE-1234.pf"), [0u8; 50]).unwrap();

        let cleaner = Cleaner::new(vec![
            (CleanupTarget::UserTemp, user.path().to_path_buf()),
            (CleanupTarget::Prefetch, prefetch.path().to_path_buf()),
        ]);
        let sizes = cleaner.measure();
        assert_eq!(sizes[0].bytes, 125);
        assert_eq!(sizes[0].files, 3);
        assert_eq!(sizes[1].bytes, 50);

        let seen = std::cell::RefCell::new(Vec::new());
        let progress = |_: &str, percent: u8| seen.borrow_mut().push(percent);
        let reports = cleaner.clean(Some(&progress));
        assert_eq!(seen.into_inner(), vec![0, 50, 100]);

        let mut total = CleanupReport::default();
        for (_, report) in &reports {
            total.merge(report);
        }
        assert_eq!(total.bytes_freed, 175);
        assert_eq!(total.files_deleted, 4);
    }

    #[test]
    fn test_config_selects_targets() {
        let config = CleanupConfig {
            user_temp: true,
            windows_temp: false,
            prefetch: true,
        };
        let cleaner = Cleaner::from_config(&config);
        let targets: Vec<CleanupTarget> = cleaner.locations().iter().map(|(t, _)| *t).collect();
        assert_eq!(targets, vec![CleanupTarget::UserTemp, CleanupTarget::Prefetch]);

        let only = cleaner.only(&[CleanupTarget::Prefetch]);
        assert_eq!(only.locations().len(), 1);
        assert_eq!(
            "windows-temp".parse::<CleanupTarget>().unwrap(),
            CleanupTarget::WindowsTemp
        );
    }

    #[test]
    fn test_component_store_cleanup() {
        let runner = ScriptedRunner::new().on(
            "dism /online /cleanup-image /startcomponentcleanup",
            "Deployment Image Servicing and Management tool\r\n[==========================100.0%==========================]\r\nThe operation completed successfully.\r\n",
        );
        assert_eq!(
            component_store_cleanup(&runner).unwrap(),
            "The operation completed successfully."
        );

        let denied = ScriptedRunner::new().on_failure("dism", 740, "Error: 740\r\nElevated permissions are required");
        assert!(matches!(
            component_store_cleanup(&denied),
            Err(CommandError::Failed { code: Some(740), .. })
        ));
    }
}

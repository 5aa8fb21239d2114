// src/browser/backup.rs

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::profiles::{BrowserKind, BrowserLocator};
use crate::{
    constants::{BROWSER_BACKUP_INFO_FILE, SERVICE_COMMAND_TIMEOUT, TIMESTAMP_FORMAT},
    errors::BackupError,
    export::{iso_timestamp, write_json},
    utils::{
        command::CommandRunner,
        fs::{copy_tree, directory_size, replace_path},
    },
};

/// Contents of `backup_info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserBackupInfo {
    pub browser: String,
    pub timestamp: String,
    pub profiles: Vec<String>,
    pub total_files: usize,
    pub copied_files: usize,
    pub backup_date: String,
}

/// One entry of [`BrowserBackup::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupListing {
    pub browser: String,
    pub timestamp: String,
    pub path: PathBuf,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<BrowserBackupInfo>,
    /// Set when `backup_info.json` exists but cannot be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub browser: BrowserKind,
    pub restored: usize,
}

/// `Chrome_20240101_120000` -> `20240101_120000`.
fn timestamp_from_dir_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.split_once('_') {
        Some((_, timestamp)) => timestamp.to_string(),
        None => name,
    }
}

fn notify(progress: Option<&dyn Fn(&str)>, message: &str) {
    debug!("{}", message);
    if let Some(callback) = progress {
        callback(message);
    }
}

/// Copies browser profile files into timestamped backup folders and back.
pub struct BrowserBackup<'a> {
    locator: BrowserLocator,
    root: PathBuf,
    closer: Option<&'a dyn CommandRunner>,
}

impl<'a> BrowserBackup<'a> {
    pub fn new(locator: BrowserLocator, root: impl Into<PathBuf>) -> Self {
        Self {
            locator,
            root: root.into(),
            closer: None,
        }
    }

    /// Closes the browser with `taskkill` before copying its files.
    pub fn close_browser_with(mut self, runner: &'a dyn CommandRunner) -> Self {
        self.closer = Some(runner);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn locator(&self) -> &BrowserLocator {
        &self.locator
    }

    fn close_browser(&self, kind: BrowserKind) {
        let Some(runner) = self.closer else {
            return;
        };
        // Fails when the browser is not running
        match runner.run(
            "taskkill",
            &["/F", "/IM", kind.process_name()],
            SERVICE_COMMAND_TIMEOUT,
        ) {
            Ok(output) if output.success() => info!("{} -> closed before copying", kind),
            Ok(_) => debug!("{} -> not running", kind),
            Err(e) => warn!("{} -> could not close browser: {}", kind, e),
        }
    }

    /// Backs up `profiles` (all detected profiles when `None`) and returns
    /// the new backup directory with its metadata.
    pub fn backup(
        &self,
        kind: BrowserKind,
        profiles: Option<&[String]>,
        progress: Option<&dyn Fn(&str)>,
    ) -> Result<(PathBuf, BrowserBackupInfo), BackupError> {
        let data_path = self
            .locator
            .data_path(kind)
            .ok_or_else(|| BackupError::BrowserNotInstalled(kind.to_string()))?;
        let profiles = match profiles {
            Some(profiles) => profiles.to_vec(),
            None => self.locator.profiles(kind),
        };
        if profiles.is_empty() {
            return Err(BackupError::NoProfiles(kind.to_string()));
        }

        self.close_browser(kind);

        let now = Local::now();
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let backup_dir = self.root.join(format!("{}_{}", kind, timestamp));
        fs::create_dir_all(&backup_dir)?;
        notify(
            progress,
            &format!("Creating backup directory: {}", backup_dir.display()),
        );

        let mut total_files = 0;
        let mut copied_files = 0;
        for profile in &profiles {
            let source = data_path.join(profile);
            if !source.is_dir() {
                continue;
            }
            notify(progress, &format!("Backing up profile: {}", profile));
            let destination = backup_dir.join(profile);
            fs::create_dir_all(&destination)?;

            for name in kind.files_to_backup() {
                let source_file = source.join(name);
                if !source_file.exists() {
                    continue;
                }
                total_files += 1;
                let result = if source_file.is_dir() {
                    copy_tree(&source_file, &destination.join(name)).map(|_| ())
                } else {
                    fs::copy(&source_file, destination.join(name)).map(|_| ())
                };
                match result {
                    Ok(()) => {
                        copied_files += 1;
                        notify(progress, &format!("Copied: {}", name));
                    }
                    Err(e) => {
                        warn!("{} -> failed to copy {}: {}", kind, name, e);
                        notify(progress, &format!("Failed to copy {}: {}", name, e));
                    }
                }
            }
        }

        let info = BrowserBackupInfo {
            browser: kind.to_string(),
            timestamp,
            profiles,
            total_files,
            copied_files,
            backup_date: iso_timestamp(&Local::now()),
        };
        write_json(&backup_dir.join(BROWSER_BACKUP_INFO_FILE), &info)?;
        notify(
            progress,
            &format!("Backup completed: {}/{} files", copied_files, total_files),
        );
        info!(
            "{} -> backed up {}/{} files to {}",
            kind,
            copied_files,
            total_files,
            backup_dir.display()
        );
        Ok((backup_dir, info))
    }

    pub fn read_info(backup_dir: &Path) -> Result<BrowserBackupInfo, BackupError> {
        let info_file = backup_dir.join(BROWSER_BACKUP_INFO_FILE);
        if !info_file.is_file() {
            return Err(BackupError::BackupNotFound(info_file));
        }
        Ok(serde_json::from_str(&fs::read_to_string(info_file)?)?)
    }

    /// Copies a backup back into the original browser, or into `target`.
    ///
    /// Directories already present in the profile are replaced.
    pub fn restore(
        &self,
        backup_dir: &Path,
        target: Option<BrowserKind>,
        progress: Option<&dyn Fn(&str)>,
    ) -> Result<RestoreSummary, BackupError> {
        if !backup_dir.is_dir() {
            return Err(BackupError::BackupNotFound(backup_dir.to_path_buf()));
        }
        let info = Self::read_info(backup_dir)?;
        let browser = match target {
            Some(kind) => kind,
            None => BrowserKind::from_str(&info.browser)
                .map_err(|_| BackupError::UnknownBrowser(info.browser.clone()))?,
        };
        let data_path = self
            .locator
            .data_path(browser)
            .ok_or_else(|| BackupError::BrowserNotInstalled(browser.to_string()))?;

        self.close_browser(browser);
        notify(progress, &format!("Restoring to {}", browser));

        let mut restored = 0;
        for profile in &info.profiles {
            let profile_backup = backup_dir.join(profile);
            if !profile_backup.is_dir() {
                continue;
            }
            notify(progress, &format!("Restoring profile: {}", profile));
            let profile_target = data_path.join(profile);
            fs::create_dir_all(&profile_target)?;

            for entry in fs::read_dir(&profile_backup)? {
                let entry = entry?;
                let name = entry.file_name();
                if name == BROWSER_BACKUP_INFO_FILE {
                    continue;
                }
                match replace_path(&entry.path(), &profile_target.join(&name)) {
                    Ok(_) => {
                        restored += 1;
                        notify(progress, &format!("Restored: {}", name.to_string_lossy()));
                    }
                    Err(e) => {
                        warn!("{} -> failed to restore {:?}: {}", browser, name, e);
                        notify(
                            progress,
                            &format!("Failed to restore {}: {}", name.to_string_lossy(), e),
                        );
                    }
                }
            }
        }

        notify(
            progress,
            &format!("Restore completed: {} files restored", restored),
        );
        info!("{} -> restored {} entries from {}", browser, restored, backup_dir.display());
        Ok(RestoreSummary { browser, restored })
    }

    /// Backups under the root, newest first.
    pub fn list(&self) -> Vec<BackupListing> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut backups: Vec<BackupListing> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|path| path.join(BROWSER_BACKUP_INFO_FILE).is_file())
            .map(|path| {
                let size = directory_size(&path);
                match Self::read_info(&path) {
                    Ok(info) => BackupListing {
                        browser: info.browser.clone(),
                        timestamp: info.timestamp.clone(),
                        path,
                        size,
                        info: Some(info),
                        error: None,
                    },
                    Err(e) => BackupListing {
                        browser: "Unknown".to_string(),
                        timestamp: timestamp_from_dir_name(&path),
                        path,
                        size,
                        info: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect();
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        backups
    }

    /// Deletes a backup directory. Only directories holding a
    /// `backup_info.json` are accepted.
    pub fn delete(&self, backup_dir: &Path) -> Result<(), BackupError> {
        if !backup_dir.join(BROWSER_BACKUP_INFO_FILE).is_file() {
            return Err(BackupError::BackupNotFound(backup_dir.to_path_buf()));
        }
        fs::remove_dir_all(backup_dir)?;
        info!("Deleted browser backup {}", backup_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use walkdir::WalkDir;

    use super::*;
    use crate::utils::command::testing::ScriptedRunner;

    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(root).unwrap().to_path_buf(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    fn chrome_home() -> (tempfile::TempDir, PathBuf) {
        let home = tempfile::tempdir().unwrap();
        let data = home.path().join(".config").join("google-chrome");
        let profile = data.join("Default");
        fs::create_dir_all(profile.join("Local Storage").join("leveldb")).unwrap();
        fs::write(profile.join("Bookmarks"), br#"{"roots":{}}"#).unwrap();
        fs::write(profile.join("History"), [0u8, 1, 2, 255]).unwrap();
        fs::write(profile.join("Local Storage").join("leveldb").join("000003.log"), b"ls").unwrap();
        fs::write(profile.join("Cache.tmp"), b"not backed up").unwrap();
        (home, data)
    }

    #[test]
    fn test_backup_then_restore_is_byte_for_byte() {
        let (home, data) = chrome_home();
        let backups = tempfile::tempdir().unwrap();
        let manager = BrowserBackup::new(BrowserLocator::new(home.path()), backups.path());

        let profile = data.join("Default");
        let mut original = snapshot(&profile);
        original.retain(|path, _| !path.ends_with("Cache.tmp"));

        let (backup_dir, info) = manager.backup(BrowserKind::Chrome, None, None).unwrap();
        assert_eq!(info.profiles, vec!["Default"]);
        assert_eq!(info.total_files, 3);
        assert_eq!(info.copied_files, 3);
        assert!(backup_dir.join(BROWSER_BACKUP_INFO_FILE).is_file());

        fs::write(profile.join("Bookmarks"), b"corrupted").unwrap();
        fs::remove_file(profile.join("History")).unwrap();
        fs::write(profile.join("Local Storage").join("stale"), b"x").unwrap();

        let summary = manager.restore(&backup_dir, None, None).unwrap();
        assert_eq!(summary.browser, BrowserKind::Chrome);
        assert_eq!(summary.restored, 3);

        let mut restored = snapshot(&profile);
        restored.retain(|path, _| !path.ends_with("Cache.tmp"));
        assert_eq!(restored, original);
    }

    #[test]
    fn test_restore_into_other_browser() {
        let (home, _data) = chrome_home();
        let edge = home.path().join(".config").join("microsoft-edge");
        fs::create_dir_all(&edge).unwrap();
        let backups = tempfile::tempdir().unwrap();
        let manager = BrowserBackup::new(BrowserLocator::new(home.path()), backups.path());

        let (backup_dir, _) = manager.backup(BrowserKind::Chrome, None, None).unwrap();
        let summary = manager
            .restore(&backup_dir, Some(BrowserKind::Edge), None)
            .unwrap();
        assert_eq!(summary.browser, BrowserKind::Edge);
        assert!(edge.join("Default").join("Bookmarks").is_file());
    }

    #[test]
    fn test_backup_errors() {
        let home = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let manager = BrowserBackup::new(BrowserLocator::new(home.path()), backups.path());
        assert!(matches!(
            manager.backup(BrowserKind::Brave, None, None),
            Err(BackupError::BrowserNotInstalled(_))
        ));

        fs::create_dir_all(home.path().join(".mozilla").join("firefox")).unwrap();
        assert!(matches!(
            manager.backup(BrowserKind::Firefox, None, None),
            Err(BackupError::NoProfiles(_))
        ));
        assert!(matches!(
            manager.restore(&backups.path().join("nope"), None, None),
            Err(BackupError::BackupNotFound(_))
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let backups = tempfile::tempdir().unwrap();
        let manager = BrowserBackup::new(BrowserLocator::new("/nonexistent"), backups.path());
        for (name, timestamp) in [
            ("Chrome_20240101_100000", "20240101_100000"),
            ("Firefox_20240301_090000", "20240301_090000"),
        ] {
            let dir = backups.path().join(name);
            fs::create_dir_all(&dir).unwrap();
            write_json(
                &dir.join(BROWSER_BACKUP_INFO_FILE),
                &BrowserBackupInfo {
                    browser: name.split('_').next().unwrap().to_string(),
                    timestamp: timestamp.to_string(),
                    profiles: vec!["Default".into()],
                    total_files: 1,
                    copied_files: 1,
                    backup_date: String::new(),
                },
            )
            .unwrap();
        }
        let broken = backups.path().join("Edge_20240201_000000");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(BROWSER_BACKUP_INFO_FILE), b"{").unwrap();
        fs::create_dir_all(backups.path().join("unrelated")).unwrap();

        let listed = manager.list();
        let order: Vec<&str> = listed.iter().map(|b| b.timestamp.as_str()).collect();
        assert_eq!(order, vec!["20240301_090000", "20240201_000000", "20240101_100000"]);
        assert_eq!(listed[1].browser, "Unknown");
        assert!(listed[1].error.is_some());
        assert!(listed[0].size > 0);

        assert!(manager.delete(&backups.path().join("unrelated")).is_err());
        manager.delete(&listed[0].path).unwrap();
        assert_eq!(manager.list().len(), 2);
    }

    #[test]
    fn test_close_browser_before_copy() {
        let (home, _data) = chrome_home();
        let backups = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().on_failure("taskkill", 128, "not found");
        let manager = BrowserBackup::new(BrowserLocator::new(home.path()), backups.path())
            .close_browser_with(&runner);
        manager.backup(BrowserKind::Chrome, None, None).unwrap();
        assert_eq!(runner.calls(), vec!["taskkill /F /IM chrome.exe"]);
    }
}

// src/browser/profiles.rs

use std::{fs, path::PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum BrowserKind {
    Chrome,
    Brave,
    Edge,
    Firefox,
}

const CHROMIUM_FILES: &[&str] = &[
    "Bookmarks",
    "History",
    "Login Data",
    "Preferences",
    "Secure Preferences",
    "Web Data",
    "Cookies",
    "Local Storage",
    "Session Storage",
    "Extensions",
];

const FIREFOX_FILES: &[&str] = &[
    "places.sqlite",
    "key4.db",
    "logins.json",
    "prefs.js",
    "cookies.sqlite",
    "formhistory.sqlite",
    "extensions.json",
    "addons.json",
];

const CHROMIUM_PROFILES: &[&str] = &["Default", "Profile 1", "Profile 2", "Profile 3"];

impl BrowserKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "Google Chrome",
            BrowserKind::Brave => "Brave Browser",
            BrowserKind::Edge => "Microsoft Edge",
            BrowserKind::Firefox => "Mozilla Firefox",
        }
    }

    pub fn is_chromium(&self) -> bool {
        !matches!(self, BrowserKind::Firefox)
    }

    /// File and directory names copied from each profile.
    pub fn files_to_backup(&self) -> &'static [&'static str] {
        if self.is_chromium() {
            CHROMIUM_FILES
        } else {
            FIREFOX_FILES
        }
    }

    /// Executable image name, used to close the browser before copying.
    pub fn process_name(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome.exe",
            BrowserKind::Brave => "brave.exe",
            BrowserKind::Edge => "msedge.exe",
            BrowserKind::Firefox => "firefox.exe",
        }
    }

    /// Data directories relative to the home directory: Windows, Linux, macOS.
    fn data_dirs(&self) -> [&'static [&'static str]; 3] {
        match self {
            BrowserKind::Chrome => [
                &["AppData", "Local", "Google", "Chrome", "User Data"],
                &[".config", "google-chrome"],
                &["Library", "Application Support", "Google", "Chrome"],
            ],
            BrowserKind::Brave => [
                &["AppData", "Local", "BraveSoftware", "Brave-Browser", "User Data"],
                &[".config", "BraveSoftware", "Brave-Browser"],
                &["Library", "Application Support", "BraveSoftware", "Brave-Browser"],
            ],
            BrowserKind::Edge => [
                &["AppData", "Local", "Microsoft", "Edge", "User Data"],
                &[".config", "microsoft-edge"],
                &["Library", "Application Support", "Microsoft Edge"],
            ],
            BrowserKind::Firefox => [
                &["AppData", "Roaming", "Mozilla", "Firefox", "Profiles"],
                &[".mozilla", "firefox"],
                &["Library", "Application Support", "Firefox", "Profiles"],
            ],
        }
    }
}

/// Resolves browser data directories below a home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserLocator {
    home: PathBuf,
}

impl Default for BrowserLocator {
    fn default() -> Self {
        Self::new(dirs::home_dir().unwrap_or_default())
    }
}

impl BrowserLocator {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// First existing data directory for `kind`.
    pub fn data_path(&self, kind: BrowserKind) -> Option<PathBuf> {
        kind.data_dirs()
            .iter()
            .map(|parts| parts.iter().fold(self.home.clone(), |path, part| path.join(part)))
            .find(|path| path.is_dir())
    }

    pub fn detect(&self) -> IndexMap<BrowserKind, bool> {
        BrowserKind::iter()
            .map(|kind| (kind, self.data_path(kind).is_some()))
            .collect()
    }

    /// Profile directory names. Chromium browsers use a fixed set of names;
    /// Firefox lists every non-hidden directory.
    pub fn profiles(&self, kind: BrowserKind) -> Vec<String> {
        let Some(data_path) = self.data_path(kind) else {
            return Vec::new();
        };

        if kind.is_chromium() {
            return CHROMIUM_PROFILES
                .iter()
                .filter(|profile| data_path.join(profile).exists())
                .map(|profile| profile.to_string())
                .collect();
        }

        let Ok(entries) = fs::read_dir(&data_path) else {
            return Vec::new();
        };
        let mut profiles: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| !name.starts_with('.'))
            .collect();
        profiles.sort();
        profiles
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_detect_and_profiles() {
        let home = tempfile::tempdir().unwrap();
        let chrome = home.path().join(".config").join("google-chrome");
        fs::create_dir_all(chrome.join("Default")).unwrap();
        fs::create_dir_all(chrome.join("Profile 2")).unwrap();
        fs::create_dir_all(chrome.join("Guest Profile")).unwrap();
        let firefox = home.path().join(".mozilla").join("firefox");
        fs::create_dir_all(firefox.join("abcd.default-release")).unwrap();
        fs::create_dir_all(firefox.join(".hidden")).unwrap();

        let locator = BrowserLocator::new(home.path());
        let detected = locator.detect();
        assert!(detected[&BrowserKind::Chrome]);
        assert!(!detected[&BrowserKind::Edge]);
        assert_eq!(locator.profiles(BrowserKind::Chrome), vec!["Default", "Profile 2"]);
        assert_eq!(
            locator.profiles(BrowserKind::Firefox),
            vec!["abcd.default-release"]
        );
        assert!(locator.profiles(BrowserKind::Brave).is_empty());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(BrowserKind::from_str("firefox").unwrap(), BrowserKind::Firefox);
        assert_eq!(BrowserKind::Edge.to_string(), "Edge");
        assert!(BrowserKind::from_str("opera").is_err());
        assert!(BrowserKind::Firefox.files_to_backup().contains(&"places.sqlite"));
    }
}

// src/versions/installer.rs

use std::time::Duration;

use indexmap::IndexMap;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tracing::{info, warn};

use super::{
    catalog::{find_installable, InstallSpec},
    checker::VersionChecker,
};
use crate::{
    config::TimeoutConfig,
    errors::{CommandError, VersionError},
    orchestrator::TaskRegistry,
};

/// Package managers tried in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum PackageManager {
    Winget,
    Npm,
    Chocolatey,
}

impl PackageManager {
    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Winget => "winget",
            PackageManager::Npm => "npm",
            PackageManager::Chocolatey => "choco",
        }
    }

    fn package<'a>(&self, spec: &'a InstallSpec) -> Option<&'a str> {
        match self {
            PackageManager::Winget => spec.winget,
            PackageManager::Npm => spec.npm,
            PackageManager::Chocolatey => spec.chocolatey,
        }
    }

    /// Arguments for installing `package`, optionally pinned to `version`.
    pub fn install_args(&self, package: &str, version: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = match self {
            PackageManager::Winget => vec!["install".into(), package.into()],
            PackageManager::Npm => vec![
                "install".into(),
                "-g".into(),
                match version {
                    Some(v) => format!("{}@{}", package, v),
                    None => package.into(),
                },
            ],
            PackageManager::Chocolatey => vec!["install".into(), package.into(), "-y".into()],
        };
        if let (Some(v), PackageManager::Winget | PackageManager::Chocolatey) = (version, self) {
            args.extend(["--version".to_string(), v.to_string()]);
        }
        args
    }

    pub fn uninstall_args(&self, package: &str) -> Vec<String> {
        match self {
            PackageManager::Winget => vec!["uninstall".into(), package.into(), "--purge".into()],
            PackageManager::Npm => vec!["uninstall".into(), "-g".into(), package.into()],
            PackageManager::Chocolatey => vec!["uninstall".into(), package.into(), "-y".into()],
        }
    }
}

/// Drops empty or placeholder version requests.
pub fn normalize_version(version: Option<&str>) -> Option<&str> {
    version
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("version"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Install,
    Uninstall,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Action::Install => "install",
            Action::Uninstall => "uninstall",
        }
    }

    fn past(&self) -> &'static str {
        match self {
            Action::Install => "installed",
            Action::Uninstall => "uninstalled",
        }
    }
}

/// Installs and removes catalog tools through winget, npm or Chocolatey.
///
/// A tool can only have one install or uninstall in flight at a time; the
/// shared [`TaskRegistry`] is passed in by the caller.
pub struct Installer<'a> {
    checker: &'a VersionChecker,
    in_flight: &'a TaskRegistry,
    probe_timeout: Duration,
    timeout: Duration,
}

impl<'a> Installer<'a> {
    pub fn new(checker: &'a VersionChecker, in_flight: &'a TaskRegistry, timeouts: &TimeoutConfig) -> Self {
        Self {
            checker,
            in_flight,
            probe_timeout: timeouts.version_probe(),
            timeout: timeouts.install(),
        }
    }

    /// Reports which package managers respond to `--version`.
    pub fn available_managers(&self) -> IndexMap<PackageManager, bool> {
        PackageManager::iter()
            .map(|manager| {
                let available = self
                    .checker
                    .run(manager.program(), &["--version"], self.probe_timeout)
                    .map(|output| output.success())
                    .unwrap_or(false);
                (manager, available)
            })
            .collect()
    }

    pub fn install(
        &self,
        tool: &str,
        version: Option<&str>,
        progress: Option<&dyn Fn(&str)>,
    ) -> Result<String, VersionError> {
        let requested = version;
        let version = normalize_version(version);
        if let (Some(raw), None) = (requested, version) {
            notify(
                progress,
                &format!("Invalid version '{}' specified, using latest version instead", raw),
            );
        }
        self.execute(Action::Install, tool, version, progress)
    }

    pub fn uninstall(&self, tool: &str, progress: Option<&dyn Fn(&str)>) -> Result<String, VersionError> {
        self.execute(Action::Uninstall, tool, None, progress)
    }

    fn execute(
        &self,
        action: Action,
        tool: &str,
        version: Option<&str>,
        progress: Option<&dyn Fn(&str)>,
    ) -> Result<String, VersionError> {
        let (name, spec) =
            find_installable(tool).ok_or_else(|| VersionError::NotInstallable(tool.to_string()))?;
        let _guard = self
            .in_flight
            .begin(name)
            .ok_or_else(|| VersionError::InstallInProgress(name.to_string()))?;

        notify(progress, "Checking available package managers...");
        let available = self.available_managers();
        let methods: Vec<(PackageManager, Vec<String>)> = PackageManager::iter()
            .filter(|manager| available.get(manager).copied().unwrap_or(false))
            .filter_map(|manager| {
                let package = manager.package(spec)?;
                let args = match action {
                    Action::Install => manager.install_args(package, version),
                    Action::Uninstall => manager.uninstall_args(package),
                };
                Some((manager, args))
            })
            .collect();
        if methods.is_empty() {
            return Err(VersionError::NoPackageManager(name.to_string()));
        }

        let version_text = version
            .map(|v| format!(" (version {})", v))
            .unwrap_or_default();
        for (manager, args) in methods {
            notify(
                progress,
                &format!("{}ing {}{} using {}...", capitalize(action.verb()), name, version_text, manager),
            );
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            match self.checker.run(manager.program(), &args, self.timeout) {
                Ok(output) if output.success() => {
                    let message = format!(
                        "Successfully {} {}{} using {}",
                        action.past(),
                        name,
                        version_text,
                        manager
                    );
                    info!("{} -> {}", name, message);
                    notify(progress, &message);
                    return Ok(message);
                }
                Ok(output) => {
                    let detail = if output.stderr.trim().is_empty() {
                        output.stdout.trim()
                    } else {
                        output.stderr.trim()
                    };
                    let detail: String = detail.chars().take(100).collect();
                    warn!("{} -> {} via {} failed: {}", name, action.verb(), manager, detail);
                    notify(
                        progress,
                        &format!(
                            "Failed to {} {}{} using {}: {}",
                            action.verb(),
                            name,
                            version_text,
                            manager,
                            detail
                        ),
                    );
                }
                Err(CommandError::Timeout { .. }) => {
                    return Err(VersionError::PackageManagerFailed {
                        action: action.verb(),
                        tool: format!("{}{}", name, version_text),
                        reason: "timed out (5 minutes)".to_string(),
                    });
                }
                Err(e) => {
                    warn!("{} -> {} via {} failed: {}", name, action.verb(), manager, e);
                    notify(progress, &format!("Error running {}: {}", manager, e));
                }
            }
        }

        Err(VersionError::PackageManagerFailed {
            action: action.verb(),
            tool: format!("{}{}", name, version_text),
            reason: "all available methods failed".to_string(),
        })
    }
}

fn notify(progress: Option<&dyn Fn(&str)>, message: &str) {
    if let Some(callback) = progress {
        callback(message);
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

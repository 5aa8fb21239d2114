// src/startup/scanner.rs

use std::{
    collections::{HashMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Result;
use chrono::{DateTime, Local};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    item::{Backend, Impact, Scope, StartupItem},
    locations::{
        extract_executable_path, is_critical_component, is_critical_service, is_critical_uwp_app,
        is_windows_system_service, ApprovedLocation, RunKeyLocation, APPROVED_KEYS,
        HIGH_IMPACT_PROGRAMS, RUN_KEYS,
    },
    toggle::approved_flag_enabled,
};
use crate::{
    config::{StartupConfig, TimeoutConfig},
    constants::{
        DISABLED_FILE_EXTENSION, DISABLED_VALUE_SUFFIX, FILE_INFO_TIMEOUT,
        HIGH_IMPACT_FILE_SIZE, MEDIUM_IMPACT_FILE_SIZE, READABLE_DATE_FORMAT,
        SYSTEM_QUERY_TIMEOUT,
    },
    errors::RegistryError,
    orchestrator::ProgressCallback,
    utils::{
        command::CommandRunner,
        powershell::{json_str, query_json_rows, quote},
        registry::{Hive, RegistryKeyValue, RegistryPath, RegistryStore},
        windows::{expand_environment_strings, startup_folders},
    },
};

const SERVICES_SCRIPT: &str = "Get-CimInstance -ClassName Win32_Service | \
Where-Object { $_.StartMode -eq 'Auto' } | \
Select-Object Name,DisplayName,PathName,Description,StartMode | \
ConvertTo-Json -Depth 2";

const TASKS_SCRIPT: &str = "Get-ScheduledTask | \
Where-Object { $_.Triggers | Where-Object { \
$_.CimClass.CimClassName -in 'MSFT_TaskBootTrigger','MSFT_TaskLogonTrigger' } } | \
Select-Object TaskName,TaskPath,Description,\
@{n='State';e={$_.State.ToString()}},\
@{n='Execute';e={($_.Actions | Select-Object -First 1).Execute}} | \
ConvertTo-Json -Depth 2";

const UWP_SCRIPT: &str = "Get-StartApps | Where-Object { $_.AppID -like '*!*' } | \
ForEach-Object { $app = $_; $packageName = $app.AppID.Split('!')[0]; \
$package = Get-AppxPackage -Name $packageName -ErrorAction SilentlyContinue | Select-Object -First 1; \
if ($package) { [PSCustomObject]@{ Name = $app.Name; AppID = $app.AppID; \
PackageName = $packageName; Publisher = $package.Publisher; \
InstallLocation = $package.InstallLocation; IsFramework = $package.IsFramework } } } | \
ConvertTo-Json -Depth 2";

const UWP_APPROVED_KEY: &str =
    "Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\StartupApproved\\StartupFolder";

/// Which locations to scan and where the startup folders are.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub registry: bool,
    pub folders: bool,
    pub services: bool,
    pub scheduled_tasks: bool,
    pub uwp_apps: bool,
    /// Look up publisher/description from executable version info.
    pub file_info: bool,
    pub user_startup_folder: Option<PathBuf>,
    pub common_startup_folder: Option<PathBuf>,
    pub query_timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&StartupConfig::default(), &TimeoutConfig::default())
    }
}

impl ScanOptions {
    /// Command-driven scans only run on Windows, where the queried tools exist.
    pub fn from_config(startup: &StartupConfig, timeouts: &TimeoutConfig) -> Self {
        let (user, common) = startup_folders();
        Self {
            registry: true,
            folders: true,
            services: cfg!(windows) && startup.scan_services,
            scheduled_tasks: cfg!(windows) && startup.scan_scheduled_tasks,
            uwp_apps: cfg!(windows) && startup.scan_uwp_apps,
            file_info: cfg!(windows),
            user_startup_folder: startup.user_startup_folder.clone().or(user),
            common_startup_folder: startup.common_startup_folder.clone().or(common),
            query_timeout: timeouts.system_query(),
        }
    }

    /// Registry and folder scans only, with no external commands.
    pub fn offline(user_folder: Option<PathBuf>, common_folder: Option<PathBuf>) -> Self {
        Self {
            registry: true,
            folders: true,
            services: false,
            scheduled_tasks: false,
            uwp_apps: false,
            file_info: false,
            user_startup_folder: user_folder,
            common_startup_folder: common_folder,
            query_timeout: SYSTEM_QUERY_TIMEOUT,
        }
    }
}

/// Walks every class of "run at logon" location and builds a fresh item list.
///
/// Each location fails soft: an unreadable or missing location is logged and
/// contributes no items.
pub struct StartupScanner<'a> {
    registry: &'a dyn RegistryStore,
    runner: &'a dyn CommandRunner,
    options: ScanOptions,
}

impl<'a> StartupScanner<'a> {
    pub fn new(
        registry: &'a dyn RegistryStore,
        runner: &'a dyn CommandRunner,
        options: ScanOptions,
    ) -> Self {
        Self {
            registry,
            runner,
            options,
        }
    }

    pub fn scan(&self, progress: Option<ProgressCallback<'_>>) -> Vec<StartupItem> {
        let report = |message: &str, percent: u8| {
            debug!("Startup scan: {} ({}%)", message, percent);
            if let Some(callback) = progress {
                callback(message, percent);
            }
        };

        let mut items = Vec::new();

        if self.options.registry {
            report("Scanning registry startup entries...", 20);
            items.extend(self.scan_registry());
        }
        if self.options.folders {
            report("Scanning startup folders...", 40);
            items.extend(self.scan_folders());
        }
        if self.options.services {
            report("Scanning Windows services...", 60);
            items.extend(soft("services", self.scan_services()));
        }
        if self.options.scheduled_tasks {
            report("Scanning scheduled tasks...", 70);
            items.extend(soft("scheduled tasks", self.scan_scheduled_tasks()));
        }
        if self.options.uwp_apps {
            report("Scanning UWP/Microsoft Store apps...", 80);
            items.extend(soft("UWP apps", self.scan_uwp_apps()));
        }

        report("Analyzing startup impact...", 90);
        if self.options.file_info {
            self.fill_file_info(&mut items);
        }
        for item in items.iter_mut() {
            item.impact = estimate_impact(item);
        }

        report("Scan complete", 100);
        info!("Found {} startup items", items.len());
        items
    }

    /// Scans `Run`-style keys and `StartupApproved` flags.
    ///
    /// A Run value that has a StartupApproved entry is reported once, as a
    /// StartupApproved item.
    pub fn scan_registry(&self) -> Vec<StartupItem> {
        let mut claimed: HashSet<(RegistryPath, String)> = HashSet::new();
        let mut approved_items = Vec::new();
        for location in APPROVED_KEYS {
            match self.scan_approved_key(location, &mut claimed) {
                Ok(found) => approved_items.extend(found),
                Err(e) => log_registry_skip(location.label, &e),
            }
        }

        let mut items = Vec::new();
        for location in RUN_KEYS {
            match self.scan_run_key(location, &claimed) {
                Ok(found) => items.extend(found),
                Err(e) => log_registry_skip(location.label, &e),
            }
        }
        items.extend(approved_items);
        items
    }

    fn scan_run_key(
        &self,
        location: &RunKeyLocation,
        claimed: &HashSet<(RegistryPath, String)>,
    ) -> Result<Vec<StartupItem>, RegistryError> {
        let path = location.path();
        let mut items = Vec::new();
        for (stored_name, value) in self.registry.list_values(&path)? {
            let Some(command) = value.as_str() else {
                continue;
            };
            let (value_name, enabled) = match stored_name.strip_suffix(DISABLED_VALUE_SUFFIX) {
                Some(base) => (base.to_string(), false),
                None => (stored_name.clone(), true),
            };
            if value_name.is_empty() || claimed.contains(&(path.clone(), value_name.clone())) {
                continue;
            }

            let mut item = StartupItem::new(
                value_name.clone(),
                location.label,
                Scope::from(location.hive),
                Backend::RegistryRun {
                    path: path.clone(),
                    value_name,
                    stored_name: stored_name.clone(),
                },
            );
            item.enabled = enabled;
            fill_command(&mut item, command);
            items.push(item);
        }
        Ok(items)
    }

    fn scan_approved_key(
        &self,
        location: &ApprovedLocation,
        claimed: &mut HashSet<(RegistryPath, String)>,
    ) -> Result<Vec<StartupItem>, RegistryError> {
        let approved_path = location.approved_path();
        let run_path = location.run_path();
        let flags = self.registry.list_values(&approved_path)?;

        // The Run key might not exist
        let commands: HashMap<String, String> = match self.registry.list_values(&run_path) {
            Ok(values) => values
                .into_iter()
                .filter_map(|(name, value)| value.as_str().map(|c| (name, c.to_string())))
                .collect(),
            Err(RegistryError::KeyNotFound(_)) => HashMap::new(),
            Err(e) => return Err(e),
        };

        let mut items = Vec::new();
        for (name, value) in flags {
            let RegistryKeyValue::Binary(data) = value else {
                continue;
            };
            if data.len() < 4 {
                continue;
            }
            let Some(command) = commands.get(&name) else {
                continue;
            };

            claimed.insert((run_path.clone(), name.clone()));
            let mut item = StartupItem::new(
                name.clone(),
                location.label,
                Scope::from(location.hive),
                Backend::StartupApproved {
                    approved_path: approved_path.clone(),
                    run_path: run_path.clone(),
                    value_name: name,
                },
            );
            item.enabled = approved_flag_enabled(&data);
            fill_command(&mut item, command);
            items.push(item);
        }
        Ok(items)
    }

    pub fn scan_folders(&self) -> Vec<StartupItem> {
        let folders = [
            (
                &self.options.user_startup_folder,
                "Startup Folder (User)",
                Scope::User,
            ),
            (
                &self.options.common_startup_folder,
                "Startup Folder (System)",
                Scope::System,
            ),
        ];

        let mut items = Vec::new();
        for (folder, label, scope) in folders {
            let Some(folder) = folder else {
                continue;
            };
            match scan_folder(folder, label, scope) {
                Ok(found) => items.extend(found),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("Startup folder '{}' does not exist", folder.display());
                }
                Err(e) => warn!("Error scanning startup folder '{}': {}", folder.display(), e),
            }
        }
        items
    }

    pub fn scan_services(&self) -> Result<Vec<StartupItem>> {
        let rows = query_json_rows(self.runner, SERVICES_SCRIPT, self.options.query_timeout)?;
        let mut items = Vec::new();
        for row in rows {
            let Some(name) = json_str(&row, "Name") else {
                continue;
            };
            let display_name = json_str(&row, "DisplayName").unwrap_or(name);
            if is_critical_service(name, display_name) {
                continue;
            }
            let description = json_str(&row, "Description").unwrap_or_default();

            let mut item = StartupItem::new(
                display_name,
                "Windows Service",
                Scope::System,
                Backend::Service {
                    service_name: name.to_string(),
                },
            );
            item.enabled = json_str(&row, "StartMode")
                .map(|mode| mode.eq_ignore_ascii_case("auto"))
                .unwrap_or(true);
            if let Some(command) = json_str(&row, "PathName") {
                fill_command(&mut item, command);
            }
            item.description = description.to_string();
            item.is_system_critical = is_windows_system_service(display_name, description);
            items.push(item);
        }
        Ok(items)
    }

    pub fn scan_scheduled_tasks(&self) -> Result<Vec<StartupItem>> {
        let rows = query_json_rows(self.runner, TASKS_SCRIPT, self.options.query_timeout)?;
        let mut items = Vec::new();
        for row in rows {
            let Some(name) = json_str(&row, "TaskName") else {
                continue;
            };
            if is_critical_service(name, name) {
                continue;
            }
            let folder = json_str(&row, "TaskPath").unwrap_or("\\");
            let task_path = format!("{}{}", folder, name);

            let mut item = StartupItem::new(
                name,
                "Scheduled Task",
                Scope::System,
                Backend::ScheduledTask { task_path },
            );
            item.enabled = task_state_enabled(json_str(&row, "State"));
            if let Some(execute) = json_str(&row, "Execute") {
                item.command = execute.to_string();
                item.path = extract_executable_path(&expand_environment_strings(execute));
            }
            item.description = json_str(&row, "Description").unwrap_or_default().to_string();
            item.is_system_critical = is_critical_component(name, &item.path);
            items.push(item);
        }
        Ok(items)
    }

    pub fn scan_uwp_apps(&self) -> Result<Vec<StartupItem>> {
        let rows = query_json_rows(self.runner, UWP_SCRIPT, self.options.query_timeout)?;
        let approved = self
            .registry
            .list_values(&RegistryPath::new(Hive::CurrentUser, UWP_APPROVED_KEY))
            .unwrap_or_default();

        let mut items = Vec::new();
        for row in rows {
            if row.get("IsFramework").and_then(Value::as_bool) == Some(true) {
                continue;
            }
            let name = json_str(&row, "Name").unwrap_or("Unknown");
            let package_name = json_str(&row, "PackageName").unwrap_or_default();
            if is_critical_uwp_app(name, package_name) {
                continue;
            }

            let mut item = StartupItem::new(
                name,
                "Microsoft Store App",
                Scope::User,
                Backend::Uwp {
                    package_name: package_name.to_string(),
                    app_id: json_str(&row, "AppID").unwrap_or_default().to_string(),
                },
            );
            item.enabled = uwp_startup_enabled(&approved, package_name);
            item.path = json_str(&row, "InstallLocation")
                .unwrap_or_default()
                .to_string();
            item.publisher = json_str(&row, "Publisher").unwrap_or_default().to_string();
            item.description = format!("UWP App: {}", package_name);
            items.push(item);
        }
        Ok(items)
    }

    /// Fills publisher and description from version info, in one PowerShell call.
    fn fill_file_info(&self, items: &mut [StartupItem]) {
        let paths: Vec<String> = items
            .iter()
            .filter(|item| item.publisher.is_empty() || item.description.is_empty())
            .map(|item| item.path.clone())
            .filter(|path| !path.is_empty() && Path::new(path).is_file())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if paths.is_empty() {
            return;
        }

        let script = format!(
            "@({}) | ForEach-Object {{ $v = (Get-Item -LiteralPath $_ -ErrorAction SilentlyContinue).VersionInfo; \
             [PSCustomObject]@{{ Path = $_; CompanyName = $v.CompanyName; FileDescription = $v.FileDescription }} }} | \
             ConvertTo-Json -Depth 2",
            paths.iter().map(|p| quote(p)).collect::<Vec<_>>().join(",")
        );
        let timeout = FILE_INFO_TIMEOUT.max(self.options.query_timeout);
        let rows = match query_json_rows(self.runner, &script, timeout) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to read file version info: {:#}", e);
                return;
            }
        };

        let info: HashMap<String, (String, String)> = rows
            .iter()
            .filter_map(|row| {
                let path = json_str(row, "Path")?;
                Some((
                    path.to_lowercase(),
                    (
                        json_str(row, "CompanyName").unwrap_or_default().to_string(),
                        json_str(row, "FileDescription").unwrap_or_default().to_string(),
                    ),
                ))
            })
            .collect();

        for item in items.iter_mut() {
            if let Some((publisher, description)) = info.get(&item.path.to_lowercase()) {
                if item.publisher.is_empty() {
                    item.publisher = publisher.clone();
                }
                if item.description.is_empty() {
                    item.description = description.clone();
                }
            }
        }
    }
}

fn soft(kind: &str, result: Result<Vec<StartupItem>>) -> Vec<StartupItem> {
    result.unwrap_or_else(|e| {
        warn!("Error scanning startup {}: {:#}", kind, e);
        Vec::new()
    })
}

fn log_registry_skip(label: &str, error: &RegistryError) {
    match error {
        RegistryError::KeyNotFound(path) => debug!("{} -> key '{}' not present", label, path),
        other => warn!("Error scanning registry {}: {}", label, other),
    }
}

fn fill_command(item: &mut StartupItem, command: &str) {
    item.command = command.to_string();
    item.path = extract_executable_path(&expand_environment_strings(command));
    item.is_system_critical = is_critical_component(&item.name, &item.path);
}

fn task_state_enabled(state: Option<&str>) -> bool {
    !matches!(state, Some(s) if s.eq_ignore_ascii_case("disabled"))
}

fn uwp_startup_enabled(approved: &[(String, RegistryKeyValue)], package_name: &str) -> bool {
    if package_name.is_empty() {
        return true;
    }
    let package = package_name.to_lowercase();
    approved
        .iter()
        .find(|(name, _)| name.to_lowercase().contains(&package))
        .and_then(|(_, value)| value.as_binary())
        .map(approved_flag_enabled)
        .unwrap_or(true)
}

fn format_modified(path: &Path) -> Option<String> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        DateTime::<Local>::from(modified)
            .format(READABLE_DATE_FORMAT)
            .to_string(),
    )
}

fn scan_folder(folder: &Path, label: &str, scope: Scope) -> io::Result<Vec<StartupItem>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    let mut items = Vec::new();
    for current in entries {
        let file_name = current
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if file_name.eq_ignore_ascii_case("desktop.ini") {
            continue;
        }

        let disabled_suffix = format!(".{}", DISABLED_FILE_EXTENSION);
        let (enabled_name, enabled) = if file_name.to_lowercase().ends_with(&disabled_suffix) {
            (
                file_name[..file_name.len() - disabled_suffix.len()].to_string(),
                false,
            )
        } else {
            (file_name.clone(), true)
        };
        let enabled_path = folder.join(&enabled_name);
        let display_name = Path::new(&enabled_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| enabled_name.clone());

        let mut item = StartupItem::new(
            display_name,
            label,
            scope,
            Backend::StartupFolder {
                file: enabled_path,
            },
        );
        item.enabled = enabled;
        item.path = current.display().to_string();
        item.last_modified = format_modified(&current);
        item.is_system_critical = is_critical_component(&item.name, &item.path);
        items.push(item);
    }
    Ok(items)
}

/// Heuristic impact from executable size and well-known heavy programs.
pub fn estimate_impact(item: &StartupItem) -> Impact {
    let mut impact = Impact::Low;

    if !item.path.is_empty() {
        if let Ok(meta) = fs::metadata(&item.path) {
            if meta.len() > HIGH_IMPACT_FILE_SIZE {
                impact = Impact::High;
            } else if meta.len() > MEDIUM_IMPACT_FILE_SIZE {
                impact = Impact::Medium;
            }
        }
    }

    let name = item.name.to_lowercase();
    if HIGH_IMPACT_PROGRAMS.iter().any(|p| name.contains(p)) {
        impact = Impact::High;
    }

    if item.is_system_critical {
        impact = Impact::Medium;
    }
    impact
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        startup::item::LocationKind,
        utils::{command::testing::ScriptedRunner, registry::MemoryRegistry},
    };

    const RUN: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";
    const APPROVED: &str =
        "Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\StartupApproved\\Run";

    fn string(s: &str) -> RegistryKeyValue {
        RegistryKeyValue::String(s.to_string())
    }

    #[test]
    fn test_empty_system_yields_no_items() {
        let registry = MemoryRegistry::new();
        let runner = ScriptedRunner::new();
        let dir = tempfile::tempdir().unwrap();
        let options = ScanOptions::offline(
            Some(dir.path().join("does-not-exist")),
            Some(dir.path().to_path_buf()),
        );
        let scanner = StartupScanner::new(&registry, &runner, options);
        assert!(scanner.scan(None).is_empty());
    }

    #[test]
    fn test_failing_command_scans_are_skipped() {
        let registry = MemoryRegistry::new();
        let runner = ScriptedRunner::new().on_timeout("powershell");
        let options = ScanOptions {
            services: true,
            scheduled_tasks: true,
            uwp_apps: true,
            ..ScanOptions::offline(None, None)
        };
        let scanner = StartupScanner::new(&registry, &runner, options);
        assert!(scanner.scan(None).is_empty());
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn test_registry_run_and_disabled_values() {
        let registry = MemoryRegistry::new();
        let user_run = RegistryPath::new(Hive::CurrentUser, RUN);
        registry
            .write_value(&user_run, "Discord", &string("\"C:\\Apps\\Discord.exe\" --start"))
            .unwrap();
        registry
            .write_value(&user_run, "Notes_DISABLED", &string("C:\\Apps\\notes.exe"))
            .unwrap();
        registry
            .write_value(&user_run, "Flag", &RegistryKeyValue::Dword(1))
            .unwrap();

        let runner = ScriptedRunner::new();
        let scanner = StartupScanner::new(&registry, &runner, ScanOptions::offline(None, None));
        let items = scanner.scan_registry();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Discord");
        assert!(items[0].enabled);
        assert_eq!(items[0].path, "C:\\Apps\\Discord.exe");
        assert_eq!(items[0].scope, Scope::User);
        assert_eq!(items[1].name, "Notes");
        assert!(!items[1].enabled);
        assert!(matches!(
            &items[1].backend,
            Backend::RegistryRun { stored_name, .. } if stored_name == "Notes_DISABLED"
        ));
    }

    #[test]
    fn test_startup_approved_claims_run_value() {
        let registry = MemoryRegistry::new();
        let run = RegistryPath::new(Hive::CurrentUser, RUN);
        let approved = RegistryPath::new(Hive::CurrentUser, APPROVED);
        registry
            .write_value(&run, "Spotify", &string("C:\\Spotify\\Spotify.exe /minimized"))
            .unwrap();
        registry
            .write_value(&run, "Plain", &string("C:\\plain.exe"))
            .unwrap();
        registry
            .write_value(
                &approved,
                "Spotify",
                &RegistryKeyValue::Binary(vec![0x03, 0, 0, 0, 1, 2, 3, 4]),
            )
            .unwrap();
        // Flag without a Run command is ignored
        registry
            .write_value(
                &approved,
                "Orphan",
                &RegistryKeyValue::Binary(vec![0x02, 0, 0, 0]),
            )
            .unwrap();

        let runner = ScriptedRunner::new();
        let scanner = StartupScanner::new(&registry, &runner, ScanOptions::offline(None, None));
        let items = scanner.scan_registry();

        let names: Vec<(&str, LocationKind)> = items
            .iter()
            .map(|i| (i.name.as_str(), i.location()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Plain", LocationKind::RegistryRun),
                ("Spotify", LocationKind::StartupApproved),
            ]
        );
        let spotify = &items[1];
        assert!(!spotify.enabled);
        assert_eq!(spotify.impact, Impact::Unknown);
        assert_eq!(estimate_impact(spotify), Impact::High);
    }

    #[test]
    fn test_startup_folder_items() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Tool.lnk"), b"x").unwrap();
        fs::write(dir.path().join("Old.lnk.disabled"), b"y").unwrap();
        fs::write(dir.path().join("desktop.ini"), b"z").unwrap();

        let registry = MemoryRegistry::new();
        let runner = ScriptedRunner::new();
        let scanner = StartupScanner::new(
            &registry,
            &runner,
            ScanOptions::offline(Some(dir.path().to_path_buf()), None),
        );
        let items = scanner.scan_folders();

        assert_eq!(items.len(), 2);
        let old = items.iter().find(|i| i.name == "Old").unwrap();
        assert!(!old.enabled);
        assert!(matches!(
            &old.backend,
            Backend::StartupFolder { file } if file.ends_with("Old.lnk")
        ));
        assert!(old.last_modified.is_some());
        let tool = items.iter().find(|i| i.name == "Tool").unwrap();
        assert!(tool.enabled);
        assert_eq!(tool.scope, Scope::User);
    }

    #[test]
    fn test_services_tasks_and_uwp_parsing() {
        let registry = MemoryRegistry::new();
        let runner = ScriptedRunner::new()
            .on(
                "powershell -NoProfile -NonInteractive -ExecutionPolicy Bypass -Command Get-CimInstance",
                r#"[
                    {"Name":"Spooler","DisplayName":"Print Spooler","PathName":"C:\\Windows\\System32\\spoolsv.exe","StartMode":"Auto"},
                    {"Name":"SteamService","DisplayName":"Steam Client Service","PathName":"\"C:\\Steam\\steamservice.exe\" /RunAsService","Description":"Steam","StartMode":"Auto"}
                ]"#,
            )
            .on(
                "powershell -NoProfile -NonInteractive -ExecutionPolicy Bypass -Command Get-ScheduledTask",
                r#"{"TaskName":"VendorUpdate","TaskPath":"\\Vendor\\","State":"Disabled","Execute":"C:\\Vendor\\update.exe"}"#,
            )
            .on(
                "powershell -NoProfile -NonInteractive -ExecutionPolicy Bypass -Command Get-StartApps",
                r#"[
                    {"Name":"Spotify","AppID":"SpotifyAB.SpotifyMusic_zpdnekdrzrea0!Spotify","PackageName":"SpotifyAB.SpotifyMusic_zpdnekdrzrea0","Publisher":"CN=Spotify","IsFramework":false},
                    {"Name":"Photos","AppID":"Microsoft.Windows.Photos_8wekyb3d8bbwe!App","PackageName":"Microsoft.Windows.Photos_8wekyb3d8bbwe","IsFramework":false},
                    {"Name":"VCLibs","AppID":"Microsoft.VCLibs!App","PackageName":"Microsoft.VCLibs","IsFramework":true}
                ]"#,
            );
        let options = ScanOptions {
            services: true,
            scheduled_tasks: true,
            uwp_apps: true,
            ..ScanOptions::offline(None, None)
        };
        let scanner = StartupScanner::new(&registry, &runner, options);

        let services = scanner.scan_services().unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "Steam Client Service");
        assert_eq!(services[0].path, "C:\\Steam\\steamservice.exe");
        assert!(matches!(
            &services[0].backend,
            Backend::Service { service_name } if service_name == "SteamService"
        ));

        let tasks = scanner.scan_scheduled_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].enabled);
        assert!(matches!(
            &tasks[0].backend,
            Backend::ScheduledTask { task_path } if task_path == "\\Vendor\\VendorUpdate"
        ));

        let apps = scanner.scan_uwp_apps().unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "Spotify");
        assert_eq!(apps[0].publisher, "CN=Spotify");
        assert!(apps[0].enabled);
    }

    #[test]
    fn test_progress_is_reported_in_order() {
        let registry = MemoryRegistry::new();
        let runner = ScriptedRunner::new();
        let scanner = StartupScanner::new(&registry, &runner, ScanOptions::offline(None, None));
        let seen = std::sync::Mutex::new(Vec::new());
        let callback = |_: &str, percent: u8| seen.lock().unwrap().push(percent);
        scanner.scan(Some(&callback));
        assert_eq!(*seen.lock().unwrap(), vec![20, 40, 90, 100]);
    }

    #[test]
    fn test_impact_for_critical_items() {
        let mut item = StartupItem::new(
            "explorer helper",
            "Registry (User)",
            Scope::User,
            Backend::RegistryRun {
                path: RegistryPath::new(Hive::CurrentUser, RUN),
                value_name: "x".into(),
                stored_name: "x".into(),
            },
        );
        item.is_system_critical = true;
        assert_eq!(estimate_impact(&item), Impact::Medium);
        item.is_system_critical = false;
        assert_eq!(estimate_impact(&item), Impact::Low);
    }
}

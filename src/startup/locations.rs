// src/startup/locations.rs

use crate::utils::registry::{Hive, RegistryPath};

/// A `Run`-style registry key whose values are command lines.
#[derive(Debug, Clone, Copy)]
pub struct RunKeyLocation {
    pub hive: Hive,
    pub subkey: &'static str,
    pub label: &'static str,
}

/// A `StartupApproved` key and the `Run` key it holds flags for.
#[derive(Debug, Clone, Copy)]
pub struct ApprovedLocation {
    pub hive: Hive,
    pub approved_subkey: &'static str,
    pub run_subkey: &'static str,
    pub label: &'static str,
}

impl RunKeyLocation {
    pub fn path(&self) -> RegistryPath {
        RegistryPath::new(self.hive, self.subkey)
    }
}

impl ApprovedLocation {
    pub fn approved_path(&self) -> RegistryPath {
        RegistryPath::new(self.hive, self.approved_subkey)
    }

    pub fn run_path(&self) -> RegistryPath {
        RegistryPath::new(self.hive, self.run_subkey)
    }
}

const RUN: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";
const RUN_WOW64: &str = "Software\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Run";
const APPROVED_RUN: &str =
    "Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\StartupApproved\\Run";
const APPROVED_RUN32: &str =
    "Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\StartupApproved\\Run32";

pub const RUN_KEYS: &[RunKeyLocation] = &[
    RunKeyLocation {
        hive: Hive::CurrentUser,
        subkey: RUN,
        label: "Registry (User)",
    },
    RunKeyLocation {
        hive: Hive::LocalMachine,
        subkey: RUN,
        label: "Registry (System)",
    },
    RunKeyLocation {
        hive: Hive::CurrentUser,
        subkey: "Software\\Microsoft\\Windows\\CurrentVersion\\RunOnce",
        label: "Registry (User Once)",
    },
    RunKeyLocation {
        hive: Hive::LocalMachine,
        subkey: "Software\\Microsoft\\Windows\\CurrentVersion\\RunOnce",
        label: "Registry (System Once)",
    },
    RunKeyLocation {
        hive: Hive::LocalMachine,
        subkey: RUN_WOW64,
        label: "Registry (System WOW64)",
    },
    RunKeyLocation {
        hive: Hive::LocalMachine,
        subkey: "Software\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\RunOnce",
        label: "Registry (System WOW64 Once)",
    },
    RunKeyLocation {
        hive: Hive::CurrentUser,
        subkey: "Software\\Microsoft\\Windows\\CurrentVersion\\RunServices",
        label: "Registry (User Services)",
    },
    RunKeyLocation {
        hive: Hive::LocalMachine,
        subkey: "Software\\Microsoft\\Windows\\CurrentVersion\\RunServices",
        label: "Registry (System Services)",
    },
    RunKeyLocation {
        hive: Hive::CurrentUser,
        subkey: "Software\\Microsoft\\Windows\\CurrentVersion\\RunServicesOnce",
        label: "Registry (User Services Once)",
    },
    RunKeyLocation {
        hive: Hive::LocalMachine,
        subkey: "Software\\Microsoft\\Windows\\CurrentVersion\\RunServicesOnce",
        label: "Registry (System Services Once)",
    },
];

// Run32 flags belong to the 32-bit view of the Run key.
pub const APPROVED_KEYS: &[ApprovedLocation] = &[
    ApprovedLocation {
        hive: Hive::CurrentUser,
        approved_subkey: APPROVED_RUN,
        run_subkey: RUN,
        label: "Windows Startup (User)",
    },
    ApprovedLocation {
        hive: Hive::LocalMachine,
        approved_subkey: APPROVED_RUN,
        run_subkey: RUN,
        label: "Windows Startup (System)",
    },
    ApprovedLocation {
        hive: Hive::CurrentUser,
        approved_subkey: APPROVED_RUN32,
        run_subkey: RUN_WOW64,
        label: "Windows Startup (User 32-bit)",
    },
    ApprovedLocation {
        hive: Hive::LocalMachine,
        approved_subkey: APPROVED_RUN32,
        run_subkey: RUN_WOW64,
        label: "Windows Startup (System 32-bit)",
    },
];

/// Name fragments of Windows shell components that need confirmation before disabling.
const CRITICAL_COMPONENTS: &[&str] = &[
    "explorer",
    "dwm",
    "winlogon",
    "ctfmon",
    "sihost",
    "runtimebroker",
    "searchui",
    "startmenuexperiencehost",
    "shellexperiencehost",
    "windows security",
    "windows defender",
    "audiodg",
    "conhost",
    "taskhostw",
    "backgroundtaskhost",
    "applicationframehost",
];

const SYSTEM_PATH_FRAGMENTS: &[&str] = &[
    "system32",
    "syswow64",
    "windows\\system",
    "\\windows\\",
    "c:\\windows",
];

/// Services that are never listed as startup items.
const CRITICAL_SERVICES: &[&str] = &[
    "winlogon",
    "csrss",
    "smss",
    "wininit",
    "lsass",
    "services",
    "rpcss",
    "dcomlaunch",
    "rpcendpointmapper",
    "cryptsvc",
    "eventlog",
    "dhcp",
    "dnscache",
    "netlogon",
    "netman",
    "nsi",
    "plugplay",
    "power",
    "schedule",
    "spooler",
    "themes",
    "winmgmt",
    "bits",
];

const SYSTEM_SERVICE_INDICATORS: &[&str] = &[
    "windows",
    "microsoft",
    "system",
    "audio",
    "network",
    "security",
    "update",
    "defender",
    "firewall",
];

/// Store packages that are never listed as startup items.
const CRITICAL_UWP_APPS: &[&str] = &[
    "microsoft.windows.cortana",
    "microsoft.windows.search",
    "microsoft.windowsstore",
    "microsoft.windows.photos",
    "microsoft.windows.calculator",
    "microsoft.windowscamera",
    "microsoft.windows.alarms",
    "microsoft.windows.maps",
    "microsoft.office",
    "microsoft.microsoftedge",
    "microsoft.windows.contentdeliverymanager",
];

/// Programs known to be heavy at startup.
pub const HIGH_IMPACT_PROGRAMS: &[&str] = &[
    "adobe",
    "office",
    "skype",
    "steam",
    "discord",
    "spotify",
    "chrome",
    "firefox",
    "antivirus",
    "backup",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Whether `name`/`path` look like a Windows shell component or live in a
/// Windows system directory.
pub fn is_critical_component(name: &str, path: &str) -> bool {
    contains_any(&name.to_lowercase(), CRITICAL_COMPONENTS)
        || contains_any(&path.to_lowercase(), SYSTEM_PATH_FRAGMENTS)
}

pub fn is_critical_service(name: &str, display_name: &str) -> bool {
    contains_any(&name.to_lowercase(), CRITICAL_SERVICES)
        || contains_any(&display_name.to_lowercase(), CRITICAL_SERVICES)
}

/// Services that are listed but flagged as part of Windows.
pub fn is_windows_system_service(display_name: &str, description: &str) -> bool {
    contains_any(
        &format!("{} {}", display_name, description).to_lowercase(),
        SYSTEM_SERVICE_INDICATORS,
    )
}

pub fn is_critical_uwp_app(app_name: &str, package_name: &str) -> bool {
    contains_any(&package_name.to_lowercase(), CRITICAL_UWP_APPS)
        || contains_any(&app_name.to_lowercase(), CRITICAL_UWP_APPS)
}

/// Extracts the executable path from a command line.
///
/// Quoted paths are taken up to the closing quote, otherwise everything up
/// to the first space.
pub fn extract_executable_path(command_line: &str) -> String {
    let command_line = command_line.trim();
    if let Some(rest) = command_line.strip_prefix('"') {
        if let Some(end) = rest.find('"') {
            return rest[..end].to_string();
        }
    }
    command_line
        .split(' ')
        .next()
        .unwrap_or(command_line)
        .to_string()
}

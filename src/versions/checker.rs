// src/versions/checker.rs

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::catalog::{Probe, ToolSpec, TOOLS};
use crate::{
    config::TimeoutConfig,
    constants::MAX_VERSION_LENGTH,
    errors::CommandError,
    orchestrator::TaskOrchestrator,
    utils::{
        command::{CommandOutput, CommandRunner},
        powershell::{execute_powershell_script, quote},
    },
};

pub const STATUS_NOT_INSTALLED: &str = "Not installed";
pub const STATUS_NOT_FOUND: &str = "Not found";
pub const STATUS_TIMEOUT: &str = "Timeout (5s)";
pub const STATUS_PERMISSION_DENIED: &str = "Permission denied";
const STATUS_MYSQL_NOT_FOUND: &str = "Not found in common locations";

/// Category -> tool -> version text (or a failure status), in catalog order.
pub type VersionResults = IndexMap<String, IndexMap<String, String>>;

/// Receives `(finished, total, tool name)` as probes complete.
pub type VersionProgress<'a> = &'a dyn Fn(usize, usize, &str);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub installed: bool,
    pub version: String,
}

impl ProbeOutcome {
    fn found(version: impl Into<String>) -> Self {
        Self {
            installed: true,
            version: version.into(),
        }
    }

    fn missing(status: impl Into<String>) -> Self {
        Self {
            installed: false,
            version: status.into(),
        }
    }
}

/// Whether a version string from a report denotes an installed tool.
pub fn is_installed_status(version: &str) -> bool {
    !(version == STATUS_NOT_INSTALLED
        || version == STATUS_TIMEOUT
        || version == STATUS_PERMISSION_DENIED
        || version.starts_with(STATUS_NOT_FOUND)
        || version.starts_with("Error:"))
}

/// Cleans `--version` output down to a one-line version string.
pub fn extract_version(output: &str) -> String {
    let first_line = output.lines().next().unwrap_or_default().trim();
    let lower = first_line.to_lowercase();

    let version = if lower.starts_with("python")
        || lower.starts_with("composer version")
        || first_line.starts_with('v')
        || lower.contains("version")
    {
        first_line.to_string()
    } else if first_line.starts_with(|c: char| c.is_ascii_digit())
        && first_line.split('.').count() >= 2
    {
        format!("Version {}", first_line)
    } else {
        first_line.to_string()
    };
    version.chars().take(MAX_VERSION_LENGTH).collect()
}

/// Finds the first `x.y[.z]` number following one of `markers` in `text`.
///
/// Markers are matched case-insensitively; whitespace, `:` and `.` between
/// the marker and the number are skipped.
fn find_version_after(text: &str, markers: &[&str], min_parts: usize) -> Option<String> {
    let lower = text.to_lowercase();
    for marker in markers {
        let mut start = 0;
        while let Some(found) = lower[start..].find(marker) {
            let after = start + found + marker.len();
            let candidate: String = lower[after..]
                .trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '.')
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            let candidate = candidate.trim_end_matches('.');
            let parts = candidate.split('.').filter(|p| !p.is_empty()).count();
            if parts >= min_parts && !candidate.starts_with('.') {
                return Some(candidate.to_string());
            }
            start = after;
        }
    }
    None
}

/// A MySQL install location; `dir_prefix` matches versioned directories
/// such as `MySQL Server 8.0` below `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlLocation {
    pub base: PathBuf,
    pub dir_prefix: Option<String>,
    pub relative: PathBuf,
}

impl MySqlLocation {
    fn fixed(path: &str) -> Self {
        Self {
            base: PathBuf::from(path),
            dir_prefix: None,
            relative: PathBuf::new(),
        }
    }

    fn versioned(base: &str, dir_prefix: &str, relative: &str) -> Self {
        Self {
            base: PathBuf::from(base),
            dir_prefix: Some(dir_prefix.to_string()),
            relative: PathBuf::from(relative),
        }
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let Some(prefix) = &self.dir_prefix else {
            return vec![self.base.clone()];
        };
        let Ok(entries) = fs::read_dir(&self.base) else {
            return Vec::new();
        };
        let prefix = prefix.to_lowercase();
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter(|e| e.file_name().to_string_lossy().to_lowercase().starts_with(&prefix))
            .map(|e| e.path().join(&self.relative))
            .collect();
        dirs.sort();
        dirs
    }
}

/// Directories searched when a tool is not on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackRoots {
    pub mysql: Vec<MySqlLocation>,
    pub wamp: Vec<PathBuf>,
    pub xampp: Vec<PathBuf>,
}

impl Default for FallbackRoots {
    fn default() -> Self {
        Self {
            mysql: vec![
                MySqlLocation::versioned(
                    "C:\\Program Files\\MySQL",
                    "MySQL Server ",
                    "bin\\mysql.exe",
                ),
                MySqlLocation::versioned(
                    "C:\\Program Files (x86)\\MySQL",
                    "MySQL Server ",
                    "bin\\mysql.exe",
                ),
                MySqlLocation::fixed("C:\\xampp\\mysql\\bin\\mysql.exe"),
                MySqlLocation::versioned("C:\\wamp64\\bin\\mysql", "mysql", "bin\\mysql.exe"),
                MySqlLocation::versioned("C:\\wamp\\bin\\mysql", "mysql", "bin\\mysql.exe"),
                MySqlLocation::versioned("C:\\laragon\\bin\\mysql", "mysql", "bin\\mysql.exe"),
                MySqlLocation::fixed("C:\\AppServ\\MySQL\\bin\\mysql.exe"),
            ],
            wamp: [
                "C:\\wamp64",
                "C:\\wamp",
                "D:\\wamp64",
                "D:\\wamp",
                "C:\\Program Files\\WampServer",
                "C:\\Program Files (x86)\\WampServer",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
            xampp: [
                "C:\\xampp",
                "D:\\xampp",
                "C:\\Program Files\\XAMPP",
                "C:\\Program Files (x86)\\XAMPP",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
        }
    }
}

impl FallbackRoots {
    pub fn none() -> Self {
        Self {
            mysql: Vec::new(),
            wamp: Vec::new(),
            xampp: Vec::new(),
        }
    }
}

fn read_head(path: &Path, limit: u64) -> Option<String> {
    let mut buffer = Vec::new();
    fs::File::open(path)
        .ok()?
        .take(limit)
        .read_to_end(&mut buffer)
        .ok()?;
    Some(String::from_utf8_lossy(&buffer).to_string())
}

/// Probes developer tools for their installed versions.
#[derive(Clone)]
pub struct VersionChecker {
    runner: Arc<dyn CommandRunner>,
    probe_timeout: Duration,
    total_timeout: Duration,
    roots: Arc<FallbackRoots>,
    use_shell: bool,
}

impl VersionChecker {
    pub fn new(runner: Arc<dyn CommandRunner>, timeouts: &TimeoutConfig) -> Self {
        Self {
            runner,
            probe_timeout: timeouts.version_probe(),
            total_timeout: timeouts.version_check_total(),
            roots: Arc::new(FallbackRoots::default()),
            use_shell: cfg!(windows),
        }
    }

    pub fn with_fallback_roots(mut self, roots: FallbackRoots) -> Self {
        self.roots = Arc::new(roots);
        self
    }

    /// Routes probes through `cmd /C` so `.cmd` shims such as `npm` resolve.
    pub fn with_shell(mut self, use_shell: bool) -> Self {
        self.use_shell = use_shell;
        self
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub(crate) fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        if self.use_shell {
            let mut shell_args = vec!["/C", program];
            shell_args.extend_from_slice(args);
            self.runner.run("cmd", &shell_args, timeout)
        } else {
            self.runner.run(program, args, timeout)
        }
    }

    fn try_command(&self, program: &str, args: &[&str]) -> ProbeOutcome {
        let output = match self.run(program, args, self.probe_timeout) {
            Ok(output) => output,
            Err(CommandError::Timeout { .. }) => return ProbeOutcome::missing(STATUS_TIMEOUT),
            Err(CommandError::NotFound(_)) => return ProbeOutcome::missing(STATUS_NOT_FOUND),
            Err(CommandError::PermissionDenied(_)) => {
                return ProbeOutcome::missing(STATUS_PERMISSION_DENIED)
            }
            Err(e) => {
                let message: String = e.to_string().chars().take(50).collect();
                return ProbeOutcome::missing(format!("Error: {}", message));
            }
        };

        let stdout = output.stdout.trim();
        let stderr = output.stderr.trim();
        if output.success() {
            let text = if stdout.is_empty() { stderr } else { stdout };
            return ProbeOutcome::found(extract_version(text));
        }

        // Some tools print their version to stderr and still exit non-zero
        let lower = stderr.to_lowercase();
        if !stderr.is_empty() && ["version", "v"].iter().any(|hint| lower.contains(hint)) {
            return ProbeOutcome::found(extract_version(stderr));
        }
        ProbeOutcome::missing(STATUS_NOT_INSTALLED)
    }

    /// Probes one tool, falling back to install-directory detection where available.
    pub fn check_tool(&self, tool: &ToolSpec) -> ProbeOutcome {
        match tool.probe {
            Probe::Wamp => self.check_wamp(),
            Probe::Xampp => self.check_xampp(),
            Probe::Command(program, args) => {
                let outcome = self.try_command(program, args);
                if outcome.installed {
                    return outcome;
                }
                let fallback = match program {
                    "mysql" => Some(self.check_mysql_alternative()),
                    "composer" => Some(self.check_composer_alternative()),
                    _ => None,
                };
                match fallback {
                    Some(found) if found.installed => found,
                    Some(_) if program == "mysql" => ProbeOutcome::missing(STATUS_MYSQL_NOT_FOUND),
                    _ => outcome,
                }
            }
        }
    }

    fn check_mysql_alternative(&self) -> ProbeOutcome {
        for location in &self.roots.mysql {
            for candidate in location.candidates() {
                if !candidate.is_file() {
                    continue;
                }
                let outcome = self.try_command(&candidate.to_string_lossy(), &["--version"]);
                if outcome.installed {
                    return outcome;
                }
            }
        }

        if self.service_output_contains("MySQL80", "RUNNING") {
            return ProbeOutcome::found("MySQL Service Running (version unknown)");
        }
        ProbeOutcome::missing(STATUS_MYSQL_NOT_FOUND)
    }

    fn check_composer_alternative(&self) -> ProbeOutcome {
        let alternatives: [(&str, &[&str]); 2] = [
            ("composer.phar", &["--version"]),
            ("php", &["composer.phar", "--version"]),
        ];
        for (program, args) in alternatives {
            let outcome = self.try_command(program, args);
            if outcome.installed {
                return outcome;
            }
        }
        ProbeOutcome::missing(STATUS_NOT_FOUND)
    }

    /// Runs `sc query <service>` and checks its stdout for `needle`
    /// (case-insensitive). An empty needle only requires success.
    fn service_output_contains(&self, service: &str, needle: &str) -> bool {
        match self.runner.run("sc", &["query", service], self.probe_timeout) {
            Ok(output) if output.success() => output
                .stdout
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => false,
        }
    }

    fn file_version(&self, exe: &Path) -> Option<String> {
        let script = format!(
            "(Get-Item -LiteralPath {}).VersionInfo.FileVersion",
            quote(&exe.to_string_lossy())
        );
        execute_powershell_script(self.runner.as_ref(), &script, self.probe_timeout)
            .ok()
            .filter(|v| !v.is_empty())
    }

    fn check_wamp(&self) -> ProbeOutcome {
        for root in self.roots.wamp.iter().filter(|p| p.is_dir()) {
            if let Some(version) = self.wamp_version(root) {
                return ProbeOutcome::found(format!(
                    "WAMP Server {} (at {})",
                    version,
                    root.display()
                ));
            }
        }
        if self.service_output_contains("wampapache64", "") {
            return ProbeOutcome::found("WAMP Server (service detected, version unknown)");
        }
        ProbeOutcome::missing(STATUS_NOT_FOUND)
    }

    fn wamp_version(&self, root: &Path) -> Option<String> {
        let manager = root.join("wampmanager.exe");
        if manager.is_file() {
            if let Some(version) = self.file_version(&manager) {
                return Some(version);
            }
        }
        for name in ["readme.txt", "VERSION", "CHANGELOG"] {
            let version = read_head(&root.join(name), 1000)
                .and_then(|text| find_version_after(&text, &["version", "v"], 2));
            if version.is_some() {
                return version;
            }
        }

        if let Ok(entries) = fs::read_dir(root.join("bin").join("apache")) {
            let mut apache: Vec<String> = entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect();
            apache.sort();
            if let Some(first) = apache.first() {
                return Some(format!("with Apache {}", first));
            }
        }

        manager.is_file().then(|| "detected".to_string())
    }

    fn check_xampp(&self) -> ProbeOutcome {
        for root in self.roots.xampp.iter().filter(|p| p.is_dir()) {
            if let Some(version) = self.xampp_version(root) {
                return ProbeOutcome::found(format!("XAMPP {} (at {})", version, root.display()));
            }
        }
        if self.service_output_contains("Apache2.4", "xampp") {
            return ProbeOutcome::found("XAMPP (service detected, version unknown)");
        }
        ProbeOutcome::missing(STATUS_NOT_FOUND)
    }

    fn xampp_version(&self, root: &Path) -> Option<String> {
        let control = root.join("xampp-control.exe");
        if control.is_file() {
            if let Some(version) = self.file_version(&control) {
                return Some(version);
            }
        }
        for name in ["readme_en.txt", "readme_de.txt", "CHANGELOG", "VERSION"] {
            let version = read_head(&root.join(name), 2000).and_then(|text| {
                find_version_after(&text, &["xampp for windows", "xampp", "version", "v"], 3)
            });
            if version.is_some() {
                return version;
            }
        }

        let httpd = root.join("apache").join("bin").join("httpd.exe");
        if httpd.is_file() {
            if let Ok(output) = self.runner.run(&httpd.to_string_lossy(), &["-v"], self.probe_timeout) {
                if let Some(version) = output
                    .success()
                    .then(|| find_version_after(&output.stdout, &["apache/"], 3))
                    .flatten()
                {
                    return Some(format!("with Apache {}", version));
                }
            }
        }

        control.is_file().then(|| "detected".to_string())
    }

    /// Probes every catalog tool on background workers.
    ///
    /// Waits at most the configured total timeout; probes that have not
    /// reported by then are listed as timed out.
    pub fn check_all(&self, progress: Option<VersionProgress<'_>>) -> VersionResults {
        let mut results: VersionResults = IndexMap::new();
        for tool in TOOLS {
            results
                .entry(tool.category.to_string())
                .or_default()
                .insert(tool.name.to_string(), STATUS_TIMEOUT.to_string());
        }

        let orchestrator = TaskOrchestrator::<&'static ToolSpec, ProbeOutcome>::new();
        for tool in TOOLS {
            let checker = self.clone();
            orchestrator.submit(tool, move || Ok(checker.check_tool(tool)));
        }

        let total = TOOLS.len();
        let deadline = Instant::now() + self.total_timeout;
        let mut finished = 0;
        while finished < total {
            let Some(result) = orchestrator.recv_result_until(deadline) else {
                warn!(
                    "Version check timed out: {} of {} tools finished",
                    finished, total
                );
                break;
            };
            finished += 1;
            let tool = result.id;
            let version = match result.outcome {
                Ok(outcome) => outcome.version,
                Err(e) => format!("Error: {}", e.to_string().chars().take(30).collect::<String>()),
            };
            debug!("{} -> {}", tool.name, version);
            if let Some(entry) = results
                .get_mut(tool.category)
                .and_then(|tools| tools.get_mut(tool.name))
            {
                *entry = version;
            }
            if let Some(callback) = progress {
                callback(finished, total, tool.name);
            }
        }

        info!("Checked {} of {} tools", finished, total);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::command::testing::ScriptedRunner;

    fn checker(runner: ScriptedRunner) -> VersionChecker {
        VersionChecker::new(Arc::new(runner), &TimeoutConfig::default())
            .with_shell(false)
            .with_fallback_roots(FallbackRoots::none())
    }

    fn command_tool(name: &'static str, program: &'static str) -> ToolSpec {
        ToolSpec {
            name,
            category: "Test",
            probe: Probe::Command(program, &["--version"]),
        }
    }

    #[test]
    fn test_extract_version_rules() {
        assert_eq!(extract_version("Python 3.12.1\n"), "Python 3.12.1");
        assert_eq!(extract_version("v20.11.0"), "v20.11.0");
        assert_eq!(extract_version("10.2.4\nextra"), "Version 10.2.4");
        assert_eq!(
            extract_version("git version 2.43.0.windows.1"),
            "git version 2.43.0.windows.1"
        );
        assert_eq!(extract_version("nightly"), "nightly");
        assert_eq!(extract_version(&"x".repeat(150)).len(), MAX_VERSION_LENGTH);
        assert_eq!(extract_version(""), "");
    }

    #[test]
    fn test_find_version_after() {
        assert_eq!(
            find_version_after("Welcome\nVersion: 3.3.0 released", &["version"], 2),
            Some("3.3.0".to_string())
        );
        assert_eq!(
            find_version_after("XAMPP for Windows 8.2.12", &["xampp for windows"], 3),
            Some("8.2.12".to_string())
        );
        assert_eq!(find_version_after("version unknown", &["version"], 2), None);
    }

    #[test]
    fn test_probe_statuses() {
        let runner = ScriptedRunner::new()
            .on("node --version", "v20.11.0\n")
            .on_failure("java --version", 1, "openjdk version \"21\" 2023-09-19")
            .on_failure("ruby --version", 1, "")
            .on_timeout("go --version")
            .on_missing("php --version");
        let checker = checker(runner);

        let node = checker.check_tool(&command_tool("Node.js", "node"));
        assert_eq!(node, ProbeOutcome::found("v20.11.0"));
        let java = checker.check_tool(&command_tool("Java", "java"));
        assert!(java.installed);
        assert_eq!(java.version, "openjdk version \"21\" 2023-09-19");
        assert_eq!(
            checker.check_tool(&command_tool("Ruby", "ruby")).version,
            STATUS_NOT_INSTALLED
        );
        assert_eq!(
            checker.check_tool(&command_tool("Go", "go")).version,
            STATUS_TIMEOUT
        );
        assert_eq!(
            checker.check_tool(&command_tool("PHP", "php")).version,
            STATUS_NOT_FOUND
        );
    }

    #[test]
    fn test_shell_wrapping() {
        let runner = Arc::new(ScriptedRunner::new().on("cmd /C npm --version", "10.2.4"));
        let checker = VersionChecker::new(runner.clone(), &TimeoutConfig::default())
            .with_shell(true)
            .with_fallback_roots(FallbackRoots::none());
        let npm = checker.check_tool(&command_tool("npm", "npm"));
        assert_eq!(npm.version, "Version 10.2.4");
        assert_eq!(runner.calls(), vec!["cmd /C npm --version"]);
    }

    #[test]
    fn test_composer_and_mysql_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let server = dir.path().join("MySQL Server 8.0").join("bin");
        fs::create_dir_all(&server).unwrap();
        let mysql = server.join("mysql.exe");
        fs::write(&mysql, b"").unwrap();

        let runner = ScriptedRunner::new()
            .on_missing("composer --version")
            .on("php composer.phar --version", "Composer version 2.7.1 2024-02-09")
            .on_missing("mysql --version")
            .on(
                &format!("{} --version", mysql.display()),
                "mysql  Ver 8.0.36 for Win64",
            );
        let checker = checker(runner).with_fallback_roots(FallbackRoots {
            mysql: vec![MySqlLocation {
                base: dir.path().to_path_buf(),
                dir_prefix: Some("MySQL Server ".into()),
                relative: PathBuf::from("bin").join("mysql.exe"),
            }],
            ..FallbackRoots::none()
        });

        let composer = checker.check_tool(&command_tool("Composer", "composer"));
        assert_eq!(composer.version, "Composer version 2.7.1 2024-02-09");
        let found = checker.check_tool(&command_tool("MySQL", "mysql"));
        assert!(found.installed);
        assert_eq!(found.version, "mysql  Ver 8.0.36 for Win64");
    }

    #[test]
    fn test_mysql_service_and_missing() {
        let running = checker(
            ScriptedRunner::new()
                .on_missing("mysql")
                .on("sc query MySQL80", "STATE : 4 RUNNING"),
        );
        assert_eq!(
            running.check_tool(&command_tool("MySQL", "mysql")).version,
            "MySQL Service Running (version unknown)"
        );

        let absent = checker(ScriptedRunner::new());
        let outcome = absent.check_tool(&command_tool("MySQL", "mysql"));
        assert!(!outcome.installed);
        assert_eq!(outcome.version, STATUS_MYSQL_NOT_FOUND);
    }

    #[test]
    fn test_xampp_and_wamp_directory_detection() {
        let dir = tempfile::tempdir().unwrap();
        let xampp = dir.path().join("xampp");
        fs::create_dir_all(&xampp).unwrap();
        fs::write(
            xampp.join("readme_en.txt"),
            "###### ApacheFriends XAMPP (Basic Package) version 8.2.12 ######",
        )
        .unwrap();
        let wamp = dir.path().join("wamp64");
        fs::create_dir_all(wamp.join("bin").join("apache").join("apache2.4.58")).unwrap();

        let checker = checker(ScriptedRunner::new()).with_fallback_roots(FallbackRoots {
            wamp: vec![dir.path().join("missing"), wamp.clone()],
            xampp: vec![xampp.clone()],
            ..FallbackRoots::none()
        });

        let found = checker.check_tool(&ToolSpec {
            name: "XAMPP",
            category: "Development Environments",
            probe: Probe::Xampp,
        });
        assert_eq!(
            found.version,
            format!("XAMPP 8.2.12 (at {})", xampp.display())
        );
        let found = checker.check_tool(&ToolSpec {
            name: "WAMP Server",
            category: "Development Environments",
            probe: Probe::Wamp,
        });
        assert_eq!(
            found.version,
            format!("WAMP Server with Apache apache2.4.58 (at {})", wamp.display())
        );
    }

    #[test]
    fn test_check_all_fills_every_tool() {
        let runner = ScriptedRunner::new().on("git --version", "git version 2.43.0");
        let checker = checker(runner);
        let calls = std::sync::Mutex::new(0usize);
        let progress = |_: usize, _: usize, _: &str| *calls.lock().unwrap() += 1;
        let results = checker.check_all(Some(&progress));

        assert_eq!(results.len(), 8);
        let total: usize = results.values().map(|tools| tools.len()).sum();
        assert_eq!(total, TOOLS.len());
        assert_eq!(*calls.lock().unwrap(), TOOLS.len());
        assert_eq!(results["Version Control"]["Git"], "git version 2.43.0");
        assert_eq!(results["Languages"]["Python"], STATUS_NOT_FOUND);
        assert!(!is_installed_status(&results["Databases"]["MySQL"]));
        assert!(is_installed_status("git version 2.43.0"));
    }
}

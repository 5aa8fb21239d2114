// src/services.rs

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, info, warn};

use crate::{
    errors::ServiceError,
    utils::command::{CommandOutput, CommandRunner},
};

// `sc` exits with the Win32 error code
const ERROR_SERVICE_ALREADY_RUNNING: i32 = 1056;
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;

/// How a service is started, as accepted by `sc config <name> start= <mode>`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    #[strum(to_string = "auto", serialize = "automatic")]
    Auto,
    #[strum(to_string = "delayed-auto", serialize = "delayed")]
    #[serde(rename = "delayed-auto")]
    DelayedAuto,
    #[strum(to_string = "demand", serialize = "manual")]
    Demand,
    Disabled,
    Boot,
    System,
}

impl StartMode {
    /// Parses the `START_TYPE` value printed by `sc qc`, e.g. `2   AUTO_START  (DELAYED)`.
    pub fn from_sc_output(value: &str) -> Option<Self> {
        let token = code_token(value)?;
        Some(match token {
            "AUTO_START" if value.contains("DELAYED") => StartMode::DelayedAuto,
            "AUTO_START" => StartMode::Auto,
            "DEMAND_START" => StartMode::Demand,
            "DISABLED" => StartMode::Disabled,
            "BOOT_START" => StartMode::Boot,
            "SYSTEM_START" => StartMode::System,
            _ => return None,
        })
    }

    /// Whether the service starts on its own at boot.
    pub fn is_automatic(&self) -> bool {
        !matches!(self, StartMode::Demand | StartMode::Disabled)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    Stopped,
    StartPending,
    StopPending,
    Running,
    ContinuePending,
    PausePending,
    Paused,
}

impl ServiceState {
    /// Parses the `STATE` value printed by `sc query`, e.g. `4  RUNNING`.
    pub fn from_sc_output(value: &str) -> Option<Self> {
        code_token(value)?.parse().ok()
    }
}

/// The symbolic part of an `sc` value such as `4  RUNNING`.
fn code_token(value: &str) -> Option<&str> {
    let mut tokens = value.split_whitespace();
    let first = tokens.next()?;
    if first.chars().all(|c| c.is_ascii_digit()) {
        tokens.next()
    } else {
        Some(first)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ServiceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_mode: Option<StartMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<String>,
}

impl ServiceInfo {
    fn from_fields(fields: &IndexMap<String, String>) -> Option<Self> {
        let name = fields.get("SERVICE_NAME").filter(|n| !n.is_empty())?.clone();
        Some(Self {
            display_name: fields
                .get("DISPLAY_NAME")
                .filter(|d| !d.is_empty())
                .cloned()
                .unwrap_or_else(|| name.clone()),
            name,
            state: fields
                .get("STATE")
                .and_then(|v| ServiceState::from_sc_output(v)),
            start_mode: fields
                .get("START_TYPE")
                .and_then(|v| StartMode::from_sc_output(v)),
            binary_path: fields
                .get("BINARY_PATH_NAME")
                .filter(|p| !p.is_empty())
                .cloned(),
        })
    }
}

fn is_field_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Splits `sc query`/`sc qc` output into one field map per `SERVICE_NAME` block.
pub fn parse_sc_output(output: &str) -> Vec<IndexMap<String, String>> {
    let mut blocks: Vec<IndexMap<String, String>> = Vec::new();
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let key = key.trim();
        if !is_field_key(key) {
            continue;
        }
        if key == "SERVICE_NAME" {
            blocks.push(IndexMap::new());
        }
        if let Some(block) = blocks.last_mut() {
            block.insert(key.to_string(), value.trim().to_string());
        }
    }
    blocks
}

/// Drives the service control manager through `sc.exe`.
pub struct ServiceController<'a> {
    runner: &'a dyn CommandRunner,
    timeout: Duration,
}

impl<'a> ServiceController<'a> {
    pub fn new(runner: &'a dyn CommandRunner, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    fn sc(&self, args: &[&str]) -> Result<CommandOutput, ServiceError> {
        debug!("sc {}", args.join(" "));
        Ok(self.runner.run("sc", args, self.timeout)?)
    }

    /// Runs `sc` and maps "does not exist" to [`ServiceError::NotFound`].
    fn sc_checked(&self, name: &str, args: &[&str]) -> Result<CommandOutput, ServiceError> {
        let output = self.sc(args)?;
        if output.status == Some(ERROR_SERVICE_DOES_NOT_EXIST) {
            return Err(ServiceError::NotFound(name.to_string()));
        }
        Ok(output.into_result("sc")?)
    }

    /// Every installed service with its current state.
    pub fn list(&self) -> Result<Vec<ServiceInfo>, ServiceError> {
        let output = self.sc(&["query", "state=", "all"])?.into_result("sc")?;
        let services: Vec<ServiceInfo> = parse_sc_output(&output.stdout)
            .iter()
            .filter_map(ServiceInfo::from_fields)
            .collect();
        debug!("Found {} services", services.len());
        Ok(services)
    }

    /// State from `sc query` merged with configuration from `sc qc`.
    pub fn query(&self, name: &str) -> Result<ServiceInfo, ServiceError> {
        let status = self.sc_checked(name, &["query", name])?;
        let config = self.sc_checked(name, &["qc", name])?;

        let mut fields = parse_sc_output(&config.stdout)
            .into_iter()
            .next()
            .unwrap_or_default();
        if let Some(state_block) = parse_sc_output(&status.stdout).into_iter().next() {
            for (key, value) in state_block {
                fields.entry(key).or_insert(value);
            }
        }
        ServiceInfo::from_fields(&fields).ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }

    pub fn start(&self, name: &str) -> Result<String, ServiceError> {
        let output = self.sc(&["start", name])?;
        match output.status {
            Some(ERROR_SERVICE_ALREADY_RUNNING) => {
                info!("{} -> already running", name);
                Ok(format!("{} is already running", name))
            }
            Some(ERROR_SERVICE_DOES_NOT_EXIST) => Err(ServiceError::NotFound(name.to_string())),
            _ => {
                output.into_result("sc")?;
                info!("{} -> start requested", name);
                Ok(format!("Started {}", name))
            }
        }
    }

    pub fn stop(&self, name: &str) -> Result<String, ServiceError> {
        let output = self.sc(&["stop", name])?;
        match output.status {
            Some(ERROR_SERVICE_NOT_ACTIVE) => {
                info!("{} -> not running", name);
                Ok(format!("{} is not running", name))
            }
            Some(ERROR_SERVICE_DOES_NOT_EXIST) => Err(ServiceError::NotFound(name.to_string())),
            _ => {
                output.into_result("sc")?;
                info!("{} -> stop requested", name);
                Ok(format!("Stopped {}", name))
            }
        }
    }

    pub fn set_start_mode(&self, name: &str, mode: StartMode) -> Result<String, ServiceError> {
        let mode_arg = mode.to_string();
        self.sc_checked(name, &["config", name, "start=", mode_arg.as_str()])?;
        info!("{} -> start mode set to {}", name, mode);
        Ok(format!("Changed {} to {} start", name, mode))
    }

    /// Resolves a service name or display name to the service name.
    ///
    /// Exact service names win over display names; both compare
    /// case-insensitively.
    pub fn resolve_name(&self, name_or_display: &str) -> Result<String, ServiceError> {
        let services = self.list()?;
        services
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name_or_display))
            .or_else(|| {
                services
                    .iter()
                    .find(|s| s.display_name.eq_ignore_ascii_case(name_or_display))
            })
            .map(|s| s.name.clone())
            .ok_or_else(|| {
                warn!("No service named '{}'", name_or_display);
                ServiceError::NotFound(name_or_display.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::{errors::CommandError, utils::command::testing::ScriptedRunner};

    const QUERY_ALL: &str = "
SERVICE_NAME: AdobeARMservice
DISPLAY_NAME: Adobe Acrobat Update Service
        TYPE               : 10  WIN32_OWN_PROCESS
        STATE              : 4  RUNNING
                                (STOPPABLE, NOT_PAUSABLE, ACCEPTS_SHUTDOWN)
        WIN32_EXIT_CODE    : 0  (0x0)
        SERVICE_EXIT_CODE  : 0  (0x0)
        CHECKPOINT         : 0x0
        WAIT_HINT          : 0x0

SERVICE_NAME: wuauserv
DISPLAY_NAME: Windows Update
        TYPE               : 20  WIN32_SHARE_PROCESS
        STATE              : 1  STOPPED
        WIN32_EXIT_CODE    : 0  (0x0)
";

    const QC_WUAUSERV: &str = "[SC] QueryServiceConfig SUCCESS

SERVICE_NAME: wuauserv
        TYPE               : 20  WIN32_SHARE_PROCESS
        START_TYPE         : 2   AUTO_START  (DELAYED)
        ERROR_CONTROL      : 1   NORMAL
        BINARY_PATH_NAME   : C:\\Windows\\system32\\svchost.exe -k netsvcs -p
        LOAD_ORDER_GROUP   :
        TAG                : 0
        DISPLAY_NAME       : Windows Update
        DEPENDENCIES       : rpcss
        SERVICE_START_NAME : LocalSystem
";

    const QUERY_WUAUSERV: &str = "
SERVICE_NAME: wuauserv
        TYPE               : 20  WIN32_SHARE_PROCESS
        STATE              : 3  STOP_PENDING
";

    fn controller(runner: &ScriptedRunner) -> ServiceController<'_> {
        ServiceController::new(runner, Duration::from_secs(1))
    }

    #[test]
    fn test_list_parses_every_block() {
        let runner = ScriptedRunner::new().on("sc query state= all", QUERY_ALL);
        let services = controller(&runner).list().unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].name, "AdobeARMservice");
        assert_eq!(services[0].display_name, "Adobe Acrobat Update Service");
        assert_eq!(services[0].state, Some(ServiceState::Running));
        assert_eq!(services[1].state, Some(ServiceState::Stopped));
        assert_eq!(services[1].start_mode, None);
    }

    #[test]
    fn test_query_merges_state_and_config() {
        let runner = ScriptedRunner::new()
            .on("sc query wuauserv", QUERY_WUAUSERV)
            .on("sc qc wuauserv", QC_WUAUSERV);
        let info = controller(&runner).query("wuauserv").unwrap();
        assert_eq!(info.display_name, "Windows Update");
        assert_eq!(info.state, Some(ServiceState::StopPending));
        assert_eq!(info.start_mode, Some(StartMode::DelayedAuto));
        assert_eq!(
            info.binary_path.as_deref(),
            Some("C:\\Windows\\system32\\svchost.exe -k netsvcs -p")
        );
    }

    #[test]
    fn test_missing_service_is_not_found() {
        let runner = ScriptedRunner::new().on_failure(
            "sc",
            ERROR_SERVICE_DOES_NOT_EXIST,
            "[SC] OpenService FAILED 1060:",
        );
        let sc = controller(&runner);
        assert!(matches!(sc.query("nope"), Err(ServiceError::NotFound(_))));
        assert!(matches!(sc.start("nope"), Err(ServiceError::NotFound(_))));
        assert!(matches!(
            sc.set_start_mode("nope", StartMode::Disabled),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_start_and_stop_tolerate_current_state() {
        let runner = ScriptedRunner::new()
            .on_failure("sc start Spooler", ERROR_SERVICE_ALREADY_RUNNING, "")
            .on_failure("sc stop Spooler", ERROR_SERVICE_NOT_ACTIVE, "")
            .on_failure("sc stop Locked", 5, "[SC] OpenService FAILED 5: Access is denied.");
        let sc = controller(&runner);
        assert_eq!(sc.start("Spooler").unwrap(), "Spooler is already running");
        assert_eq!(sc.stop("Spooler").unwrap(), "Spooler is not running");
        assert!(matches!(
            sc.stop("Locked"),
            Err(ServiceError::Command(CommandError::Failed { code: Some(5), .. }))
        ));
    }

    #[test]
    fn test_set_start_mode_arguments() {
        let runner = ScriptedRunner::new().on("sc config", "[SC] ChangeServiceConfig SUCCESS");
        let sc = controller(&runner);
        sc.set_start_mode("DiagTrack", StartMode::Disabled).unwrap();
        sc.set_start_mode("DiagTrack", StartMode::Demand).unwrap();
        sc.set_start_mode("DiagTrack", StartMode::DelayedAuto).unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "sc config DiagTrack start= disabled",
                "sc config DiagTrack start= demand",
                "sc config DiagTrack start= delayed-auto",
            ]
        );
    }

    #[test]
    fn test_resolve_name_prefers_service_name() {
        let runner = ScriptedRunner::new().on("sc query state= all", QUERY_ALL);
        let sc = controller(&runner);
        assert_eq!(sc.resolve_name("windows update").unwrap(), "wuauserv");
        assert_eq!(sc.resolve_name("WUAUSERV").unwrap(), "wuauserv");
        assert!(matches!(
            sc.resolve_name("Print Spooler"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_start_mode_parsing() {
        assert_eq!(StartMode::from_str("manual").unwrap(), StartMode::Demand);
        assert_eq!(StartMode::from_str("AUTO").unwrap(), StartMode::Auto);
        assert_eq!(StartMode::from_str("delayed-auto").unwrap(), StartMode::DelayedAuto);
        assert!(StartMode::from_str("sometimes").is_err());
        assert_eq!(StartMode::Demand.to_string(), "demand");
        assert_eq!(
            StartMode::from_sc_output("4   DISABLED"),
            Some(StartMode::Disabled)
        );
        assert!(!StartMode::Disabled.is_automatic());
        assert!(StartMode::DelayedAuto.is_automatic());
    }
}

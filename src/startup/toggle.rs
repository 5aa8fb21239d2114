// src/startup/toggle.rs

//! Backend-specific encodings of a startup item's enabled/disabled state.
//!
//! Every transition is idempotent: asking for the state an item is already in
//! succeeds without touching the system.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use super::item::{Backend, StartupItem};
use crate::{
    constants::{
        DISABLED_FILE_EXTENSION, DISABLED_VALUE_SUFFIX, SERVICE_COMMAND_TIMEOUT,
        STARTUP_APPROVED_FLAG_LEN,
    },
    errors::StartupError,
    utils::{
        command::CommandRunner,
        fs::with_appended_extension,
        registry::{RegistryKeyValue, RegistryPath, RegistryStore},
    },
};

/// Leading bytes of a StartupApproved value that mean "disabled".
const DISABLED_FLAGS: [[u8; 4]; 3] = [[0x03, 0, 0, 0], [0x07, 0, 0, 0], [0x01, 0, 0, 0]];

/// OS access needed to change startup state.
#[derive(Clone, Copy)]
pub struct ToggleContext<'a> {
    pub registry: &'a dyn RegistryStore,
    pub runner: &'a dyn CommandRunner,
}

/// Whether a StartupApproved blob encodes an enabled entry.
pub fn approved_flag_enabled(data: &[u8]) -> bool {
    data.len() < STARTUP_APPROVED_FLAG_LEN
        || !DISABLED_FLAGS
            .iter()
            .any(|flag| data[..STARTUP_APPROVED_FLAG_LEN] == flag[..])
}

/// Returns `data` with its leading flag rewritten for the requested state.
///
/// Disabling maps `02`→`03` and `06`→`07`; enabling maps `03`→`02`,
/// `07`→`06` and `01`→`02`. Bytes after the flag are preserved.
pub fn set_approved_flag(data: &[u8], enable: bool) -> Option<Vec<u8>> {
    if data.len() < STARTUP_APPROVED_FLAG_LEN {
        return None;
    }
    if approved_flag_enabled(data) == enable {
        return Some(data.to_vec());
    }
    let flag = match (enable, data[0]) {
        (false, 0x06) => 0x07,
        (false, _) => 0x03,
        (true, 0x07) => 0x06,
        (true, _) => 0x02,
    };
    let mut updated = vec![flag, 0, 0, 0];
    updated.extend_from_slice(&data[STARTUP_APPROVED_FLAG_LEN..]);
    Some(updated)
}

/// Name a Run value is stored under in the given state.
pub fn run_value_name(value_name: &str, enabled: bool) -> String {
    if enabled {
        value_name.to_string()
    } else {
        format!("{}{}", value_name, DISABLED_VALUE_SUFFIX)
    }
}

/// Renames a Run value between `Name` and `Name_DISABLED`, keeping its data and type.
///
/// The new name is written before the old one is deleted. If the delete
/// fails, the key is put back the way it was. A stale value already stored
/// under the new name is overwritten, so the key always ends with one entry.
/// Returns the name the value is stored under afterwards.
pub fn rename_run_value(
    registry: &dyn RegistryStore,
    path: &RegistryPath,
    value_name: &str,
    enable: bool,
) -> Result<String, StartupError> {
    let target = run_value_name(value_name, enable);
    let source = run_value_name(value_name, !enable);

    let existing_target = registry.read_value(path, &target)?;
    let Some(data) = registry.read_value(path, &source)? else {
        if existing_target.is_some() {
            debug!("{} -> '{}' already present in '{}'", value_name, target, path);
            return Ok(target);
        }
        return Err(StartupError::ValueNotFound {
            key: path.to_string(),
            value: source,
        });
    };
    if existing_target.is_some() {
        warn!(
            "{} -> Both '{}' and '{}' exist in '{}', keeping the live data",
            value_name, source, target, path
        );
    }

    registry.write_value(path, &target, &data)?;
    if let Err(e) = registry.delete_value(path, &source) {
        warn!(
            "{} -> Failed to delete '{}', rolling back write of '{}'",
            value_name, source, target
        );
        let rollback = match &existing_target {
            Some(previous) => registry.write_value(path, &target, previous),
            None => registry.delete_value(path, &target),
        };
        if let Err(rollback) = rollback {
            tracing::error!("{} -> Rollback failed: {}", value_name, rollback);
        }
        return Err(e.into());
    }
    debug!("{} -> Renamed '{}' to '{}' in '{}'", value_name, source, target, path);
    Ok(target)
}

/// Rewrites the leading flag bytes of a StartupApproved value.
pub fn write_approved_flag(
    registry: &dyn RegistryStore,
    path: &RegistryPath,
    value_name: &str,
    enable: bool,
) -> Result<(), StartupError> {
    let current = registry
        .read_value(path, value_name)?
        .ok_or_else(|| StartupError::ValueNotFound {
            key: path.to_string(),
            value: value_name.to_string(),
        })?;

    let invalid = |len| StartupError::InvalidBinaryFormat {
        name: value_name.to_string(),
        len,
    };
    let data = current.as_binary().ok_or_else(|| invalid(0))?;
    let updated = set_approved_flag(data, enable).ok_or_else(|| invalid(data.len()))?;

    if updated == data {
        debug!("{} -> StartupApproved flag already in requested state", value_name);
        return Ok(());
    }
    registry.write_value(path, value_name, &RegistryKeyValue::Binary(updated))?;
    Ok(())
}

/// Path of the disabled twin of `file`.
///
/// Prefers an existing sibling whose name matches `file.disabled` ignoring
/// case, since the scanner accepts any casing of the suffix.
pub fn disabled_entry_path(file: &Path) -> PathBuf {
    let disabled = with_appended_extension(file, DISABLED_FILE_EXTENSION);
    if disabled.exists() {
        return disabled;
    }
    let (Some(parent), Some(wanted)) = (disabled.parent(), disabled.file_name()) else {
        return disabled;
    };
    let wanted = wanted.to_string_lossy().to_lowercase();
    fs::read_dir(parent)
        .ok()
        .and_then(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .find(|path| {
                    path.file_name()
                        .is_some_and(|name| name.to_string_lossy().to_lowercase() == wanted)
                })
        })
        .unwrap_or(disabled)
}

/// Renames a startup folder entry between `file` and `file.disabled`.
///
/// `file` is the enabled file name. Returns the path the entry lives at afterwards.
pub fn rename_folder_entry(file: &Path, enable: bool) -> Result<PathBuf, StartupError> {
    let disabled = disabled_entry_path(file);
    let (source, target) = if enable {
        (disabled, file.to_path_buf())
    } else {
        (file.to_path_buf(), disabled)
    };

    if target.exists() {
        return Ok(target);
    }
    if !source.exists() {
        return Err(StartupError::FileNotFound(source));
    }
    fs::rename(&source, &target)?;
    Ok(target)
}

fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<(), StartupError> {
    runner
        .run(program, args, SERVICE_COMMAND_TIMEOUT)?
        .into_result(program)?;
    Ok(())
}

/// Applies the requested state to `item` and updates it in place.
///
/// On failure the item is left untouched. Returns a short success message.
pub fn set_enabled(
    ctx: ToggleContext<'_>,
    item: &mut StartupItem,
    enable: bool,
) -> Result<String, StartupError> {
    let verb = if enable { "Enabled" } else { "Disabled" };
    let message = match &mut item.backend {
        Backend::RegistryRun {
            path,
            value_name,
            stored_name,
        } => {
            *stored_name = rename_run_value(ctx.registry, path, value_name, enable)?;
            format!("{} {}", verb, item.name)
        }
        Backend::StartupApproved {
            approved_path,
            value_name,
            ..
        } => {
            write_approved_flag(ctx.registry, approved_path, value_name, enable)?;
            format!("{} {}", verb, item.name)
        }
        Backend::StartupFolder { file } => {
            let current = rename_folder_entry(file, enable)?;
            item.path = current.display().to_string();
            format!("{} {}", verb, item.name)
        }
        Backend::Service { service_name } => {
            let mode = if enable { "auto" } else { "demand" };
            run_checked(
                ctx.runner,
                "sc",
                &["config", service_name.as_str(), "start=", mode],
            )?;
            format!(
                "Changed {} to {} start",
                item.name,
                if enable { "automatic" } else { "manual" }
            )
        }
        Backend::ScheduledTask { task_path } => {
            let flag = if enable { "/enable" } else { "/disable" };
            run_checked(ctx.runner, "schtasks", &["/change", "/tn", task_path.as_str(), flag])?;
            format!("{} task {}", verb, item.name)
        }
        Backend::Uwp { .. } => return Err(StartupError::ManagedBySettings(item.name.clone())),
    };
    item.enabled = enable;
    Ok(message)
}

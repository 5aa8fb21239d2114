// src/utils/powershell.rs

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use super::command::CommandRunner;

/// Executes a PowerShell script and captures its standard output.
///
/// # Arguments
///
/// * `runner` - The command runner used to start `powershell`.
/// * `script` - The PowerShell script to execute.
/// * `timeout` - Upper bound on how long the script may run.
///
/// # Returns
///
/// * `Ok(stdout)` with surrounding whitespace trimmed.
/// * `Err(anyhow::Error)` if the process fails to start, exits non-zero or writes to stderr.
pub fn execute_powershell_script(
    runner: &dyn CommandRunner,
    script: &str,
    timeout: Duration,
) -> Result<String> {
    let output = runner
        .run(
            "powershell",
            &[
                "-NoProfile",
                "-NonInteractive",
                "-ExecutionPolicy",
                "Bypass",
                "-Command",
                script,
            ],
            timeout,
        )
        .context("Failed to execute PowerShell script")?;

    if !output.stderr.trim().is_empty() {
        tracing::error!("PowerShell script error output: {}", output.stderr.trim());
        anyhow::bail!("PowerShell script error: {}", output.stderr.trim());
    }

    if !output.success() {
        anyhow::bail!("PowerShell exited with status {:?}", output.status);
    }

    Ok(output.stdout.trim().to_string())
}

/// Runs a script ending in `ConvertTo-Json` and returns its rows.
///
/// PowerShell emits a bare object for a single result and nothing at all for
/// an empty pipeline; both are normalized to a list.
pub fn query_json_rows(
    runner: &dyn CommandRunner,
    script: &str,
    timeout: Duration,
) -> Result<Vec<Value>> {
    let stdout = execute_powershell_script(runner, script, timeout)?;
    parse_json_rows(&stdout)
}

/// Normalizes `ConvertTo-Json` output into a list of rows.
pub fn parse_json_rows(stdout: &str) -> Result<Vec<Value>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value =
        serde_json::from_str(stdout).context("Failed to parse PowerShell JSON output")?;
    Ok(match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

/// Reads a string field from a JSON row, treating `null` and non-strings as absent.
pub fn json_str<'a>(row: &'a Value, field: &str) -> Option<&'a str> {
    row.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Reads a numeric field from a JSON row.
pub fn json_u64(row: &Value, field: &str) -> Option<u64> {
    let value = row.get(field)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|f| f as u64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Quotes a value for use inside a single-quoted PowerShell string.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

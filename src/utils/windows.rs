// src/utils/windows.rs

use std::path::PathBuf;

/// Checks if the current process is running with elevated (administrator) privileges.
///
/// # Returns
///
/// - `true` if the process is elevated.
/// - `false` otherwise, and always on non-Windows platforms.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use windows::Win32::{
        Foundation::{CloseHandle, HANDLE},
        Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY},
        System::Threading::{GetCurrentProcess, OpenProcessToken},
    };

    let mut handle: HANDLE = HANDLE::default();
    if unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut handle).is_err() } {
        return false;
    }

    let mut elevation = TOKEN_ELEVATION::default();
    let size = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
    let mut ret_size = size;
    let queried = unsafe {
        GetTokenInformation(
            handle,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            size,
            &mut ret_size,
        )
        .is_ok()
    };

    // Close the handle before returning
    if unsafe { CloseHandle(handle).is_err() } {
        return false;
    }
    queried && elevation.TokenIsElevated != 0
}

#[cfg(not(windows))]
pub fn is_elevated() -> bool {
    false
}

/// Expands `%VAR%` references the way `ExpandEnvironmentStrings` does.
///
/// Unknown variables are left untouched, including their percent signs.
pub fn expand_environment_strings(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('%') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(value) if !name.is_empty() => {
                        output.push_str(&value);
                    }
                    _ => {
                        output.push('%');
                        output.push_str(name);
                        output.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

/// Resolves an environment variable to a directory path.
pub fn env_dir(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// `%SystemRoot%`, defaulting to `C:\Windows`.
pub fn system_root() -> PathBuf {
    env_dir("SystemRoot").unwrap_or_else(|| PathBuf::from("C:\\Windows"))
}

/// The per-user and all-users startup folders.
pub fn startup_folders() -> (Option<PathBuf>, Option<PathBuf>) {
    const RELATIVE: &str = "Microsoft\\Windows\\Start Menu\\Programs\\Startup";
    (
        env_dir("APPDATA").map(|p| p.join(RELATIVE)),
        env_dir("ALLUSERSPROFILE").map(|p| p.join(RELATIVE)),
    )
}

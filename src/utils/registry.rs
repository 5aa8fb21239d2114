// src/utils/registry.rs

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use indexmap::IndexMap;

use crate::errors::RegistryError;

/// Root keys a registry path may start from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Hive {
    ClassesRoot,
    CurrentUser,
    LocalMachine,
    Users,
    CurrentConfig,
}

impl Hive {
    pub fn name(&self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKEY_CLASSES_ROOT",
            Hive::CurrentUser => "HKEY_CURRENT_USER",
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
            Hive::Users => "HKEY_USERS",
            Hive::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKCR",
            Hive::CurrentUser => "HKCU",
            Hive::LocalMachine => "HKLM",
            Hive::Users => "HKU",
            Hive::CurrentConfig => "HKCC",
        }
    }
}

/// A fully qualified registry key: hive plus subkey path.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct RegistryPath {
    pub hive: Hive,
    pub subkey: String,
}

impl RegistryPath {
    pub fn new(hive: Hive, subkey: impl Into<String>) -> Self {
        Self {
            hive,
            subkey: subkey.into(),
        }
    }

    /// Case-insensitive identity, matching how Windows compares key names.
    fn normalized(&self) -> (Hive, String) {
        (self.hive, self.subkey.to_lowercase())
    }
}

impl fmt::Display for RegistryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.hive.name(), self.subkey)
    }
}

/// Enumeration of supported registry key value types.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RegistryKeyValue {
    Dword(u32),
    Qword(u64),
    Binary(Vec<u8>),
    String(String),
    ExpandString(String),
}

impl RegistryKeyValue {
    /// Returns the textual payload of `REG_SZ` / `REG_EXPAND_SZ` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RegistryKeyValue::String(s) | RegistryKeyValue::ExpandString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            RegistryKeyValue::Binary(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for RegistryKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKeyValue::Dword(v) => write!(f, "Dword({})", v),
            RegistryKeyValue::Qword(v) => write!(f, "Qword({})", v),
            RegistryKeyValue::Binary(v) => write!(f, "Binary({:?})", v),
            RegistryKeyValue::String(v) => write!(f, "String({})", v),
            RegistryKeyValue::ExpandString(v) => write!(f, "ExpandString({})", v),
        }
    }
}

/// Parses the full registry path into hive and subkey path.
///
/// Both long (`HKEY_CURRENT_USER`) and short (`HKCU`) hive names are accepted.
///
/// # Parameters
///
/// - `path`: The full registry path (e.g., "HKEY_LOCAL_MACHINE\\Software\\...").
///
/// # Returns
///
/// - `Ok(RegistryPath)` with the parsed hive and subkey path.
/// - `Err(RegistryError)` if parsing fails.
pub fn parse_registry_path(path: &str) -> Result<RegistryPath, RegistryError> {
    let components: Vec<&str> = path.split('\\').collect();
    if components.len() < 2 || components[1..].iter().all(|c| c.is_empty()) {
        return Err(RegistryError::InvalidPath(format!(
            "'{}'. Expected format 'HKEY_*\\Subkey\\...'",
            path
        )));
    }
    let hive = match components[0].to_uppercase().as_str() {
        "HKEY_LOCAL_MACHINE" | "HKLM" => Hive::LocalMachine,
        "HKEY_CURRENT_USER" | "HKCU" => Hive::CurrentUser,
        "HKEY_CLASSES_ROOT" | "HKCR" => Hive::ClassesRoot,
        "HKEY_USERS" | "HKU" => Hive::Users,
        "HKEY_CURRENT_CONFIG" | "HKCC" => Hive::CurrentConfig,
        other => return Err(RegistryError::UnsupportedHive(other.to_string())),
    };
    let subkey = components[1..]
        .iter()
        .filter(|c| !c.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\\");
    Ok(RegistryPath::new(hive, subkey))
}

/// Access to registry values under a key.
///
/// `read_value` and `list_values` fail with [`RegistryError::KeyNotFound`]
/// when the key itself does not exist. `write_value` creates missing keys.
/// `delete_value` treats a missing value as success.
pub trait RegistryStore: Send + Sync {
    fn read_value(
        &self,
        path: &RegistryPath,
        name: &str,
    ) -> Result<Option<RegistryKeyValue>, RegistryError>;

    fn list_values(
        &self,
        path: &RegistryPath,
    ) -> Result<Vec<(String, RegistryKeyValue)>, RegistryError>;

    fn write_value(
        &self,
        path: &RegistryPath,
        name: &str,
        value: &RegistryKeyValue,
    ) -> Result<(), RegistryError>;

    fn delete_value(&self, path: &RegistryPath, name: &str) -> Result<(), RegistryError>;
}

/// Returns the registry backing the current platform.
///
/// Outside Windows there is no registry, so an empty in-memory store is used
/// and every registry scan comes back empty.
pub fn system_registry() -> Box<dyn RegistryStore> {
    #[cfg(windows)]
    {
        Box::new(WinRegistry)
    }
    #[cfg(not(windows))]
    {
        Box::new(MemoryRegistry::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory registry used off-Windows and in tests.
///
/// Keys can be marked read-only (writes and deletes fail with
/// `PermissionDenied`), and single values can be protected against deletion.
#[derive(Default, Debug)]
pub struct MemoryRegistry {
    keys: Mutex<BTreeMap<(Hive, String), IndexMap<String, RegistryKeyValue>>>,
    read_only: Mutex<HashSet<(Hive, String)>>,
    protected_values: Mutex<HashSet<(Hive, String, String)>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty key if it does not exist yet.
    pub fn create_key(&self, path: &RegistryPath) {
        lock(&self.keys).entry(path.normalized()).or_default();
    }

    pub fn set_read_only(&self, path: &RegistryPath) {
        lock(&self.read_only).insert(path.normalized());
    }

    pub fn protect_value(&self, path: &RegistryPath, name: &str) {
        let (hive, subkey) = path.normalized();
        lock(&self.protected_values).insert((hive, subkey, name.to_string()));
    }

    fn check_writable(&self, path: &RegistryPath) -> Result<(), RegistryError> {
        if lock(&self.read_only).contains(&path.normalized()) {
            return Err(RegistryError::PermissionDenied(path.to_string()));
        }
        Ok(())
    }
}

impl RegistryStore for MemoryRegistry {
    fn read_value(
        &self,
        path: &RegistryPath,
        name: &str,
    ) -> Result<Option<RegistryKeyValue>, RegistryError> {
        let keys = lock(&self.keys);
        let values = keys
            .get(&path.normalized())
            .ok_or_else(|| RegistryError::KeyNotFound(path.to_string()))?;
        Ok(values.get(name).cloned())
    }

    fn list_values(
        &self,
        path: &RegistryPath,
    ) -> Result<Vec<(String, RegistryKeyValue)>, RegistryError> {
        let keys = lock(&self.keys);
        let values = keys
            .get(&path.normalized())
            .ok_or_else(|| RegistryError::KeyNotFound(path.to_string()))?;
        Ok(values
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }

    fn write_value(
        &self,
        path: &RegistryPath,
        name: &str,
        value: &RegistryKeyValue,
    ) -> Result<(), RegistryError> {
        self.check_writable(path)?;
        lock(&self.keys)
            .entry(path.normalized())
            .or_default()
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    fn delete_value(&self, path: &RegistryPath, name: &str) -> Result<(), RegistryError> {
        self.check_writable(path)?;
        let (hive, subkey) = path.normalized();
        if lock(&self.protected_values).contains(&(hive, subkey, name.to_string())) {
            return Err(RegistryError::DeleteValueError(format!(
                "'{}' in '{}': access is denied",
                name, path
            )));
        }
        let mut keys = lock(&self.keys);
        let values = keys
            .get_mut(&path.normalized())
            .ok_or_else(|| RegistryError::KeyNotFound(path.to_string()))?;
        values.shift_remove(name);
        Ok(())
    }
}

#[cfg(windows)]
pub use native::WinRegistry;

#[cfg(windows)]
mod native {
    use std::io;

    use winreg::{
        enums::{
            RegType::{self, REG_BINARY, REG_DWORD, REG_EXPAND_SZ, REG_QWORD, REG_SZ},
            HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE,
            HKEY_USERS, KEY_READ, KEY_WRITE,
        },
        RegKey, RegValue,
    };

    use super::{Hive, RegistryKeyValue, RegistryPath, RegistryStore};
    use crate::errors::RegistryError;

    /// Registry access through the Win32 registry API.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WinRegistry;

    fn predef(hive: Hive) -> RegKey {
        RegKey::predef(match hive {
            Hive::ClassesRoot => HKEY_CLASSES_ROOT,
            Hive::CurrentUser => HKEY_CURRENT_USER,
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
            Hive::Users => HKEY_USERS,
            Hive::CurrentConfig => HKEY_CURRENT_CONFIG,
        })
    }

    fn open(path: &RegistryPath, flags: u32) -> Result<RegKey, RegistryError> {
        predef(path.hive)
            .open_subkey_with_flags(&path.subkey, flags)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => RegistryError::KeyNotFound(path.to_string()),
                io::ErrorKind::PermissionDenied => {
                    RegistryError::PermissionDenied(path.to_string())
                }
                _ => RegistryError::ReadValueError(format!("Failed to open '{}': {}", path, e)),
            })
    }

    fn utf16_bytes_to_string(bytes: &[u8]) -> String {
        String::from_utf16_lossy(
            &bytes
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                .collect::<Vec<u16>>(),
        )
        .trim_end_matches('\0')
        .to_string()
    }

    fn string_to_utf16_bytes(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|c| c.to_le_bytes())
            .collect()
    }

    /// Converts a raw value, returning `None` for types this tool does not handle.
    fn decode(value: &RegValue) -> Option<RegistryKeyValue> {
        match value.vtype {
            REG_DWORD if value.bytes.len() >= 4 => Some(RegistryKeyValue::Dword(
                u32::from_le_bytes([value.bytes[0], value.bytes[1], value.bytes[2], value.bytes[3]]),
            )),
            REG_QWORD if value.bytes.len() >= 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&value.bytes[..8]);
                Some(RegistryKeyValue::Qword(u64::from_le_bytes(buf)))
            }
            REG_BINARY => Some(RegistryKeyValue::Binary(value.bytes.clone())),
            REG_SZ => Some(RegistryKeyValue::String(utf16_bytes_to_string(&value.bytes))),
            REG_EXPAND_SZ => Some(RegistryKeyValue::ExpandString(utf16_bytes_to_string(
                &value.bytes,
            ))),
            _ => None,
        }
    }

    fn encode(value: &RegistryKeyValue) -> RegValue {
        let (bytes, vtype): (Vec<u8>, RegType) = match value {
            RegistryKeyValue::Dword(v) => (v.to_le_bytes().to_vec(), REG_DWORD),
            RegistryKeyValue::Qword(v) => (v.to_le_bytes().to_vec(), REG_QWORD),
            RegistryKeyValue::Binary(data) => (data.clone(), REG_BINARY),
            RegistryKeyValue::String(s) => (string_to_utf16_bytes(s), REG_SZ),
            RegistryKeyValue::ExpandString(s) => (string_to_utf16_bytes(s), REG_EXPAND_SZ),
        };
        RegValue { bytes, vtype }
    }

    impl RegistryStore for WinRegistry {
        fn read_value(
            &self,
            path: &RegistryPath,
            name: &str,
        ) -> Result<Option<RegistryKeyValue>, RegistryError> {
            let key = open(path, KEY_READ)?;
            match key.get_raw_value(name) {
                Ok(raw) => decode(&raw).map(Some).ok_or_else(|| {
                    RegistryError::ReadValueError(format!(
                        "Unsupported registry value type {:?} for '{}'",
                        raw.vtype, name
                    ))
                }),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(RegistryError::ReadValueError(format!(
                    "Failed to read value '{}' in '{}': {}",
                    name, path, e
                ))),
            }
        }

        fn list_values(
            &self,
            path: &RegistryPath,
        ) -> Result<Vec<(String, RegistryKeyValue)>, RegistryError> {
            let key = open(path, KEY_READ)?;
            let mut values = Vec::new();
            for entry in key.enum_values() {
                let (name, raw) = entry.map_err(|e| {
                    RegistryError::ReadValueError(format!("Failed to enumerate '{}': {}", path, e))
                })?;
                match decode(&raw) {
                    Some(value) => values.push((name, value)),
                    None => tracing::trace!(
                        "Skipping value '{}' in '{}' with type {:?}",
                        name,
                        path,
                        raw.vtype
                    ),
                }
            }
            Ok(values)
        }

        fn write_value(
            &self,
            path: &RegistryPath,
            name: &str,
            value: &RegistryKeyValue,
        ) -> Result<(), RegistryError> {
            // create_subkey creates all intermediate subkeys if they don't exist
            let (key, _) = predef(path.hive)
                .create_subkey(&path.subkey)
                .map_err(|e| match e.kind() {
                    io::ErrorKind::PermissionDenied => {
                        RegistryError::PermissionDenied(path.to_string())
                    }
                    _ => RegistryError::SetValueError(format!(
                        "Failed to create or open subkey '{}': {}",
                        path, e
                    )),
                })?;
            key.set_raw_value(name, &encode(value))
                .map_err(|e| match e.kind() {
                    io::ErrorKind::PermissionDenied => {
                        RegistryError::PermissionDenied(path.to_string())
                    }
                    _ => RegistryError::SetValueError(format!(
                        "'{}' in '{}' to {}: {}",
                        name, path, value, e
                    )),
                })
        }

        fn delete_value(&self, path: &RegistryPath, name: &str) -> Result<(), RegistryError> {
            let key = open(path, KEY_WRITE)?;
            match key.delete_value(name) {
                Ok(_) => Ok(()),
                // The value does not exist; treat as success
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    Err(RegistryError::PermissionDenied(path.to_string()))
                }
                Err(e) => Err(RegistryError::DeleteValueError(format!(
                    "'{}' in '{}': {}",
                    name, path, e
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_key() -> RegistryPath {
        RegistryPath::new(
            Hive::CurrentUser,
            "Software\\Microsoft\\Windows\\CurrentVersion\\Run",
        )
    }

    #[test]
    fn test_memory_create_read_delete() {
        let registry = MemoryRegistry::new();
        let path = run_key();
        let value = RegistryKeyValue::String("C:\\Tools\\app.exe".into());

        registry
            .write_value(&path, "App", &value)
            .expect("Failed to set String value");
        assert_eq!(registry.read_value(&path, "App").unwrap(), Some(value));

        registry.delete_value(&path, "App").unwrap();
        assert_eq!(registry.read_value(&path, "App").unwrap(), None);

        // Deleting a value that is already gone is not an error
        registry.delete_value(&path, "App").unwrap();
    }

    #[test]
    fn test_memory_key_lookup_is_case_insensitive() {
        let registry = MemoryRegistry::new();
        registry
            .write_value(&run_key(), "App", &RegistryKeyValue::Dword(1))
            .unwrap();

        let upper = RegistryPath::new(
            Hive::CurrentUser,
            "SOFTWARE\\MICROSOFT\\WINDOWS\\CURRENTVERSION\\RUN",
        );
        assert_eq!(
            registry.read_value(&upper, "App").unwrap(),
            Some(RegistryKeyValue::Dword(1))
        );
    }

    #[test]
    fn test_memory_missing_key() {
        let registry = MemoryRegistry::new();
        assert!(matches!(
            registry.list_values(&run_key()),
            Err(RegistryError::KeyNotFound(_))
        ));
        assert!(matches!(
            registry.read_value(&run_key(), "App"),
            Err(RegistryError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_memory_read_only_key() {
        let registry = MemoryRegistry::new();
        let path = run_key();
        registry
            .write_value(&path, "App", &RegistryKeyValue::Dword(1))
            .unwrap();
        registry.set_read_only(&path);

        assert!(matches!(
            registry.write_value(&path, "Other", &RegistryKeyValue::Dword(2)),
            Err(RegistryError::PermissionDenied(_))
        ));
        assert!(matches!(
            registry.delete_value(&path, "App"),
            Err(RegistryError::PermissionDenied(_))
        ));
        assert_eq!(registry.list_values(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_list_values_preserves_insertion_order() {
        let registry = MemoryRegistry::new();
        let path = run_key();
        for name in ["Zeta", "Alpha", "Mid"] {
            registry
                .write_value(&path, name, &RegistryKeyValue::String(name.into()))
                .unwrap();
        }
        let names: Vec<String> = registry
            .list_values(&path)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_parse_registry_path() {
        let parsed =
            parse_registry_path("HKEY_LOCAL_MACHINE\\Software\\Microsoft\\Windows").unwrap();
        assert_eq!(parsed.hive, Hive::LocalMachine);
        assert_eq!(parsed.subkey, "Software\\Microsoft\\Windows");

        let short = parse_registry_path("hkcu\\Software\\Test").unwrap();
        assert_eq!(short.hive, Hive::CurrentUser);
        assert_eq!(short.to_string(), "HKEY_CURRENT_USER\\Software\\Test");
    }

    #[test]
    fn test_invalid_registry_path() {
        let invalid_paths = vec![
            "",
            "INVALID_HIVE\\Software",
            "HKEY_UNKNOWN\\Software",
            "HKEY_CURRENT_USER", // Missing subkey
            "HKEY_CURRENT_USER\\",
        ];

        for path in invalid_paths {
            let result = parse_registry_path(path);
            assert!(result.is_err(), "Path '{}' should be invalid", path);
        }
    }

    #[cfg(windows)]
    mod native_tests {
        use std::sync::Mutex;

        use lazy_static::lazy_static;

        use super::super::*;

        lazy_static! {
            static ref TEST_MUTEX: Mutex<()> = Mutex::new(());
        }

        fn test_path() -> RegistryPath {
            RegistryPath::new(Hive::CurrentUser, "Software\\PcToolkitRegistryTest")
        }

        #[test]
        fn test_create_modify_read_delete_binary() {
            let _lock = TEST_MUTEX.lock().unwrap(); // Ensure tests run serially

            let registry = WinRegistry;
            let path = test_path();
            let value = RegistryKeyValue::Binary(vec![0x02, 0x00, 0x00, 0x00, 0xDE, 0xAD]);

            let _ = registry.delete_value(&path, "TestBinary");
            registry
                .write_value(&path, "TestBinary", &value)
                .expect("Failed to set Binary value");
            assert_eq!(
                registry.read_value(&path, "TestBinary").unwrap(),
                Some(value)
            );

            registry.delete_value(&path, "TestBinary").unwrap();
            assert_eq!(registry.read_value(&path, "TestBinary").unwrap(), None);
        }

        #[test]
        fn test_expand_string_round_trip() {
            let _lock = TEST_MUTEX.lock().unwrap();

            let registry = WinRegistry;
            let path = test_path();
            let value = RegistryKeyValue::ExpandString("%SystemRoot%\\notepad.exe".into());

            registry.write_value(&path, "TestExpand", &value).unwrap();
            assert_eq!(
                registry.read_value(&path, "TestExpand").unwrap(),
                Some(value)
            );
            registry.delete_value(&path, "TestExpand").unwrap();
        }
    }
}

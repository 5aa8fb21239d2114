// src/utils/fs.rs

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

/// Total size in bytes of all regular files below `path`.
///
/// Entries that cannot be read are skipped. A missing path has size 0.
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Number of regular files below `path`.
pub fn file_count(path: &Path) -> usize {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}

/// Recursively copies `source` into `destination`, merging with anything
/// already there. Returns the number of files copied.
pub fn copy_tree(source: &Path, destination: &Path) -> io::Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copies a file or directory to `destination`.
///
/// A directory already present at the destination is replaced, not merged.
pub fn replace_path(source: &Path, destination: &Path) -> io::Result<usize> {
    if source.is_dir() {
        if destination.exists() {
            fs::remove_dir_all(destination)?;
        }
        copy_tree(source, destination)
    } else {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, destination)?;
        Ok(1)
    }
}

/// Appends `.extension` to the file name, keeping any existing extension.
pub fn with_appended_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(extension);
    path.with_file_name(name)
}

/// Formats a byte count in human readable form, e.g. `1.5 MB`.
pub fn format_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(1023), "1023.0 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 * 1024), "3.0 TB");
    }

    #[test]
    fn test_copy_tree_and_size() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("nested/deeper")).unwrap();
        fs::write(src.path().join("a.txt"), b"12345").unwrap();
        fs::write(src.path().join("nested/deeper/b.bin"), [0u8; 10]).unwrap();

        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("copy");
        assert_eq!(copy_tree(src.path(), &target).unwrap(), 2);
        assert_eq!(fs::read(target.join("a.txt")).unwrap(), b"12345");
        assert_eq!(directory_size(&target), 15);
        assert_eq!(file_count(&target), 2);
        assert_eq!(directory_size(&dst.path().join("missing")), 0);
    }

    #[test]
    fn test_replace_path_drops_stale_files() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("fresh"), b"new").unwrap();

        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("dir");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("stale"), b"old").unwrap();

        replace_path(src.path(), &target).unwrap();
        assert!(target.join("fresh").exists());
        assert!(!target.join("stale").exists());
    }

    #[test]
    fn test_with_appended_extension() {
        let path = Path::new("/startup/App.lnk");
        assert_eq!(
            with_appended_extension(path, "disabled"),
            PathBuf::from("/startup/App.lnk.disabled")
        );
    }
}

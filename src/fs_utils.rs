//! Filesystem helpers for cache and document writes
//!
//! - `atomic_rename`: atomic file replacement (Windows requires explicit delete)
//! - `write_atomic`: temp file + rename so readers never see a partial file

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

/// Cross-platform atomic rename that handles Windows file replacement.
///
/// On Unix, `fs::rename` atomically replaces the target if it exists.
/// On Windows, `fs::rename` fails if the target exists, so the target is
/// deleted first.
///
/// # Errors
///
/// Returns an error if the source file doesn't exist, the target cannot be
/// deleted (Windows only), or the rename itself fails.
pub fn atomic_rename(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        if dst.exists() {
            fs::remove_file(dst)?;
        }
    }
    fs::rename(src, dst)
}

/// Write `contents` next to `path` under a temp name, then rename over `path`.
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, contents)?;
    atomic_rename(&tmp, path)
}

/// Pretty-printed JSON written with [`write_atomic`]
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    write_atomic(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_rename_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.txt");
        let dst = dir.path().join("existing.txt");
        fs::write(&dst, "old content").unwrap();
        fs::write(&src, "new content").unwrap();

        atomic_rename(&src, &dst).unwrap();

        assert!(!src.exists(), "Source should not exist after rename");
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new content");
    }

    #[test]
    fn test_write_atomic_creates_parents_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out/nested/cache.json");

        write_json_atomic(&target, &serde_json::json!({"a": 1})).unwrap();

        let text = fs::read_to_string(&target).unwrap();
        assert!(text.contains("\"a\": 1"));
        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

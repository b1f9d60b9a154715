use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

/// Write bytes atomically: write to a sibling `.tmp` file, then rename into
/// place. A crash mid-write never leaves a half-written file under the final
/// name.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create directory: {}", parent.display()))?;
    }

    let tmp: PathBuf = {
        let mut name = path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    };

    fs::write(&tmp, bytes).context(format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).context(format!(
        "Failed to move {} into place at {}",
        tmp.display(),
        path.display()
    ))?;

    Ok(())
}

/// Serialize a value to pretty JSON and write it atomically.
pub fn atomic_write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("Failed to serialize value to JSON")?;
    atomic_write(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("deep").join("out.json");

        atomic_write(&target, b"{}").unwrap();

        assert!(target.exists());
        assert_eq!(fs::read(&target).unwrap(), b"{}");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.json");

        atomic_write(&target, b"data").unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["out.json".to_string()]);
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.json");

        atomic_write(&target, b"old").unwrap();
        atomic_write(&target, b"new").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn test_atomic_write_json_pretty_format() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("value.json");

        atomic_write_json(&serde_json::json!({"key": "value"}), &target).unwrap();

        let content = fs::read_to_string(&target).unwrap();
        assert!(content.contains("\"key\": \"value\""));
    }
}

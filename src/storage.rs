//! Durable file primitives shared by the learned-state stores.
//!
//! Every write is a whole-file rewrite: data goes to a temp file in the same
//! directory, is fsynced, then renamed over the target so readers in other
//! processes see either the old or the new content.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::eid::Eid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store '{0}' is busy: lock wait timed out")]
    Busy(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

impl StoreError {
    pub fn is_busy(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}

/// Write `data` to `path` atomically (temp file + fsync + rename).
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("data");
    let temp_path = parent.join(format!(".{}-{file_name}.tmp", Eid::new()));

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }

    result
}

/// Load a YAML document, falling back to the default value when the file is
/// missing or unreadable. Corruption is logged, never propagated.
pub fn read_yaml_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            log::error!("failed to read {}: {e}; starting empty", path.display());
            return T::default();
        }
    };

    if content.trim().is_empty() {
        return T::default();
    }

    match serde_yml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            log::error!("{} is corrupt: {e}; starting empty", path.display());
            T::default()
        }
    }
}

pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_yml::to_string(value)?;
    write_atomic(path, content.as_bytes())?;
    Ok(())
}

pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> io::Result<()>;
    fn read(&self, ident: &str) -> io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
    fn delete(&self, ident: &str) -> io::Result<()>;
    fn list(&self) -> Vec<String>;
}

/// Flat directory of record files.
#[derive(Clone, Debug)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(storage_dir)?;
        Ok(BackendLocal {
            base_dir: storage_dir.to_path_buf(),
        })
    }

    fn path(&self, ident: &str) -> PathBuf {
        self.base_dir.join(ident)
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        std::fs::metadata(self.path(ident)).is_ok()
    }

    fn read(&self, ident: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.path(ident))
    }

    fn write(&self, ident: &str, data: &[u8]) -> io::Result<()> {
        write_atomic(&self.path(ident), data)
    }

    fn delete(&self, ident: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path(ident)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Lists record files, skipping hidden temp files left by interrupted writes.
    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.base_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| {
                        let path = entry.path();
                        if path.is_file() {
                            path.file_name()
                                .and_then(|name| name.to_str())
                                .map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                    .filter(|name| !name.starts_with('.'))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn atomic_write_replaces_content_and_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("weights.yaml");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn corrupt_yaml_loads_as_default() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("patterns.yaml");
        std::fs::write(&path, "{ not: [valid").unwrap();

        let loaded: BTreeMap<String, f32> = read_yaml_or_default(&path);
        assert!(loaded.is_empty());

        let missing: BTreeMap<String, f32> = read_yaml_or_default(&tmp.path().join("nope.yaml"));
        assert!(missing.is_empty());
    }

    #[test]
    fn backend_lists_sorted_and_hides_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(&tmp.path().join("records")).unwrap();

        store.write("b.json", b"{}").unwrap();
        store.write("a.json", b"{}").unwrap();
        std::fs::write(store.base_dir.join(".x-a.json.tmp"), b"").unwrap();

        assert_eq!(store.list(), vec!["a.json".to_string(), "b.json".to_string()]);
        assert!(store.exists("a.json"));

        store.delete("a.json").unwrap();
        store.delete("a.json").unwrap();
        assert!(!store.exists("a.json"));
    }
}

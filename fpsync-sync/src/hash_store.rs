//! Digest of every export file as last uploaded.
//!
//! Persists a [`HashStoreFile`] at `<data_dir>/.fpsync/hashes.json`, keyed by
//! the file's path relative to the data directory. Saved with `.tmp` + rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};

/// Relative path -> SHA-256 hex digest.
pub type HashStore = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HashStoreFile {
    #[serde(default = "Utc::now")]
    pub synced_at: DateTime<Utc>,
    #[serde(default)]
    pub files: HashStore,
}

impl Default for HashStoreFile {
    fn default() -> Self {
        Self {
            synced_at: Utc::now(),
            files: HashStore::new(),
        }
    }
}

pub fn store_path_at(data_dir: &Path) -> PathBuf {
    data_dir.join(".fpsync").join("hashes.json")
}

/// Load the store, or an empty one if nothing has been uploaded yet.
pub fn load_at(data_dir: &Path) -> Result<HashStoreFile, SyncError> {
    let path = store_path_at(data_dir);
    if !path.exists() {
        return Ok(HashStoreFile::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn save_at(data_dir: &Path, store: &HashStoreFile) -> Result<(), SyncError> {
    let path = store_path_at(data_dir);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid hash store path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(store)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn empty_store_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let store = load_at(tmp.path()).unwrap();
        assert!(store.files.is_empty());
    }

    #[test]
    fn saved_digests_are_reloaded() {
        let tmp = TempDir::new().unwrap();
        let mut store = HashStoreFile::default();
        store
            .files
            .insert("bas_assessments/bas_2024.csv".into(), "deadbeef".into());

        save_at(tmp.path(), &store).unwrap();
        let loaded = load_at(tmp.path()).unwrap();
        assert_eq!(loaded.files, store.files);
        assert!(!store_path_at(tmp.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_synced_at_defaults_to_now() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"files":{"a.csv":"cafebabe"}}"#).unwrap();

        let before = Utc::now();
        let loaded = load_at(tmp.path()).unwrap();
        assert_eq!(loaded.files.get("a.csv").map(String::as_str), Some("cafebabe"));
        assert!(loaded.synced_at >= before);
    }
}

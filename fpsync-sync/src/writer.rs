//! Hash-gated atomic writer for staged export files.
//!
//! 1. SHA-256 the content.
//! 2. Compare with the digest recorded at the last upload; skip if identical
//!    (unless forced).
//! 3. Write to `<path>.fpsync.tmp`.
//! 4. Rename to the final path (atomic on POSIX).
//!
//! The caller records the digest once the staged file has been uploaded.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written; `digest` is what to record after upload.
    Written { path: PathBuf, digest: String },
    /// Content matches the recorded digest; nothing was touched.
    Unchanged { path: PathBuf },
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Stage `bytes` at `path`, unless `recorded` already matches and `force`
/// is off.
pub(crate) fn atomic_write(
    path: &Path,
    bytes: &[u8],
    recorded: Option<&str>,
    force: bool,
) -> Result<WriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.fpsync.tmp", path.display()));
    atomic_write_with_tmp(path, bytes, recorded, force, &tmp)
}

fn atomic_write_with_tmp(
    path: &Path,
    bytes: &[u8],
    recorded: Option<&str>,
    force: bool,
    tmp: &Path,
) -> Result<WriteResult, SyncError> {
    let digest = sha256_hex(bytes);
    if !force && recorded == Some(digest.as_str()) {
        tracing::debug!("unchanged: {}", path.display());
        return Ok(WriteResult::Unchanged {
            path: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, bytes).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("staged: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
        digest,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn first_write_returns_written_with_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bas_assessments").join("bas.csv");
        let result = atomic_write(&path, b"id,score\n", None, false).unwrap();
        match result {
            WriteResult::Written { digest, .. } => assert_eq!(digest, sha256_hex(b"id,score\n")),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(fs::read(&path).unwrap(), b"id,score\n");
    }

    #[test]
    fn recorded_digest_skips_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bas.csv");
        let digest = sha256_hex(b"same");
        let result = atomic_write(&path, b"same", Some(&digest), false).unwrap();
        assert!(matches!(result, WriteResult::Unchanged { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn force_rewrites_unchanged_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bas.csv");
        let digest = sha256_hex(b"same");
        let result = atomic_write(&path, b"same", Some(&digest), true).unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert!(path.exists());
    }

    #[test]
    fn changed_content_is_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bas.csv");
        let old = sha256_hex(b"v1");
        let result = atomic_write(&path, b"v2", Some(&old), false).unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clean.csv");
        atomic_write(&path, b"data", None, false).unwrap();
        let tmp_path = PathBuf::from(format!("{}.fpsync.tmp", path.display()));
        assert!(!tmp_path.exists(), ".fpsync.tmp must be cleaned up");
    }

    #[test]
    fn rename_failure_cleans_tmp() {
        let root = TempDir::new().unwrap();
        // Renaming a file over a non-empty directory fails for every user.
        let path = root.path().join("occupied");
        fs::create_dir_all(path.join("child")).unwrap();
        let tmp_path = root.path().join("occupied.fpsync.tmp");

        let err = atomic_write_with_tmp(&path, b"new", None, false, &tmp_path);
        assert!(matches!(err, Err(SyncError::Io { .. })));
        assert!(path.join("child").is_dir());
        assert!(!tmp_path.exists(), ".fpsync.tmp should be cleaned up");
    }
}

//! Local blob directory.
//!
//! Blobs are stored as `<dir>/<hash without 0x>.<ext>`. A file is written to
//! `<final path>.tmp` first and renamed into place once complete, so the
//! final name only ever refers to a fully written blob. A leftover `.tmp`
//! from an interrupted run is ignored and overwritten by the next attempt.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::storage::BlobKey;
use wasm_devtools_common::FetchError;

/// Destination directory for fetched blobs.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
    extension: String,
}

impl BlobStore {
    /// Create a store rooted at `dir`. Nothing is touched on disk yet.
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// The destination directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the destination directory and its parents if missing.
    pub async fn ensure_dir(&self) -> Result<(), FetchError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| FetchError::io(&self.dir, e))
    }

    /// Final path of the blob for `key`.
    pub fn path_for(&self, key: &BlobKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}", key.file_stem(), self.extension))
    }

    /// Returns `true` if the blob for `key` is already on disk.
    ///
    /// Presence is all that is checked; contents are trusted.
    pub async fn contains(&self, key: &BlobKey) -> Result<bool, FetchError> {
        let path = self.path_for(key);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| FetchError::io(&path, e))
    }

    /// Write `bytes` as the blob for `key` and return its final path.
    pub async fn persist(&self, key: &BlobKey, bytes: &[u8]) -> Result<PathBuf, FetchError> {
        let path = self.path_for(key);
        let tmp = temp_path(&path);

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| FetchError::io(&tmp, e))?;

        debug!(tmp = %tmp.display(), bytes_len = bytes.len(), "Staged blob");

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| FetchError::io(&path, e))?;

        Ok(path)
    }
}

/// `<path>.tmp`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(byte: u8) -> BlobKey {
        BlobKey {
            storage_key: vec![byte],
            hash: format!("0x{}", hex::encode([byte; 4])),
        }
    }

    #[test]
    fn test_path_for() {
        let store = BlobStore::new("/var/blobs", "wasm");
        assert_eq!(
            store.path_for(&key(0xab)),
            PathBuf::from("/var/blobs/abababab.wasm")
        );
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/var/blobs/abababab.wasm")),
            PathBuf::from("/var/blobs/abababab.wasm.tmp")
        );
    }

    #[tokio::test]
    async fn test_persist_then_contains() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path(), "wasm");
        let key = key(0x01);

        assert!(!store.contains(&key).await.unwrap());

        let path = store.persist(&key, b"blob").await.unwrap();

        assert!(store.contains(&key).await.unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"blob");
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_stale_temp_file_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path(), "wasm");
        let key = key(0x02);
        let tmp = temp_path(&store.path_for(&key));
        std::fs::write(&tmp, b"partial write from an earlier run").unwrap();

        // A stale temp file does not count as present
        assert!(!store.contains(&key).await.unwrap());

        let path = store.persist(&key, b"full").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"full");
        assert!(!tmp.exists());
    }

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        let store = BlobStore::new(&nested, "wasm");

        store.ensure_dir().await.unwrap();
        std::fs::write(nested.join("notes.txt"), b"keep me").unwrap();
        store.ensure_dir().await.unwrap();

        assert_eq!(std::fs::read(nested.join("notes.txt")).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_persist_without_directory_fails() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("missing"), "wasm");

        let err = store.persist(&key(0x03), b"x").await.unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }
}

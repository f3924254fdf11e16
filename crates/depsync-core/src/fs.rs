//! File access used by manifest and settings operations.
//!
//! `LocalFs` talks to the real file system; `MemoryFs` keeps files in a map
//! and can be told to fail writes.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::pkg::error::SyncError;

/// Asynchronous file access.
#[async_trait]
pub trait FileAccess: Send + Sync {
    /// Read a whole file as text.
    async fn read(&self, path: &Path) -> Result<String, SyncError>;

    /// Replace a file's contents in one step.
    async fn write(&self, path: &Path, contents: &str) -> Result<(), SyncError>;

    /// Check whether a file exists.
    async fn exists(&self, path: &Path) -> bool;

    /// Check whether a directory exists.
    async fn is_dir(&self, path: &Path) -> bool;
}

/// File access backed by the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl FileAccess for LocalFs {
    async fn read(&self, path: &Path) -> Result<String, SyncError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SyncError::fs_failed(path, e.to_string()))?;
        String::from_utf8(bytes)
            .map_err(|e| SyncError::fs_failed(path, format!("Not valid UTF-8: {e}")))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<(), SyncError> {
        let target = path.to_path_buf();
        let bytes = contents.as_bytes().to_vec();
        tokio::task::spawn_blocking(move || depsync_util::fs::atomic_write(&target, &bytes))
            .await
            .map_err(|e| SyncError::fs_failed(path, e.to_string()))?
            .map_err(|e| SyncError::fs_failed(path, e.to_string()))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
    }

    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
    }
}

/// In-memory file access.
///
/// A directory exists when it was created explicitly or holds a file.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<PathBuf, String>>,
    dirs: Mutex<HashSet<PathBuf>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.lock().insert(path.into(), contents.into());
    }

    /// Register an empty directory.
    pub fn create_dir(&self, path: impl Into<PathBuf>) {
        self.dirs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(path.into());
    }

    /// Remove a file.
    pub fn remove(&self, path: &Path) -> Option<String> {
        self.lock().remove(path)
    }

    /// Current contents of a file, without going through the trait.
    #[must_use]
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.lock().get(path).cloned()
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, String>> {
        // A poisoned map still holds consistent whole-file entries.
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl FileAccess for MemoryFs {
    async fn read(&self, path: &Path) -> Result<String, SyncError> {
        self.lock()
            .get(path)
            .cloned()
            .ok_or_else(|| SyncError::fs_failed(path, "No such file"))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<(), SyncError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::fs_failed(path, "Write refused"));
        }
        self.lock().insert(path.to_path_buf(), contents.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        let explicit = self
            .dirs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(path);
        explicit || self.lock().keys().any(|p| p != path && p.starts_with(path))
    }
}

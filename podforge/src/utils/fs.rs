//! Filesystem helpers for ephemeral working files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::Result;

/// Ensure a directory exists, creating parents as needed.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

/// Build a unique scratch file path under `dir`.
pub fn scratch_path(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}-{}.{}", prefix, uuid::Uuid::new_v4(), ext))
}

/// Tracker for ephemeral files created during one operation.
///
/// Only files registered through [`ScratchFiles::track`] are removed;
/// caller-owned inputs must never be registered. Cleanup runs on both
/// success and failure paths, so callers invoke it unconditionally after
/// the fallible body.
#[derive(Debug, Default)]
pub struct ScratchFiles {
    created: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file this operation created and therefore owns.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.created.push(path.into());
    }

    /// Paths currently tracked for cleanup.
    pub fn tracked(&self) -> &[PathBuf] {
        &self.created
    }

    /// Remove every tracked file. Missing files are ignored.
    pub async fn cleanup(&mut self) {
        for path in self.created.drain(..) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed scratch file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_removes_tracked_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let owned = dir.path().join("owned.bin");
        let caller = dir.path().join("caller.bin");
        tokio::fs::write(&owned, b"x").await.unwrap();
        tokio::fs::write(&caller, b"y").await.unwrap();

        let mut scratch = ScratchFiles::new();
        scratch.track(&owned);
        scratch.cleanup().await;

        assert!(!owned.exists());
        assert!(caller.exists());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut scratch = ScratchFiles::new();
        scratch.track(dir.path().join("never-created.bin"));
        scratch.cleanup().await;
        assert!(scratch.tracked().is_empty());
    }

    #[test]
    fn test_scratch_path_is_unique() {
        let dir = Path::new("/tmp");
        let a = scratch_path(dir, "clip", "mp3");
        let b = scratch_path(dir, "clip", "mp3");
        assert_ne!(a, b);
    }
}

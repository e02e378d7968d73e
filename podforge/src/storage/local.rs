//! Directory-backed object storage.
//!
//! Default backend for single-node deployments and tests: keys map to
//! files under one root directory, URLs are `file://` paths unless a
//! public base URL is configured (e.g. the CDN fronting the directory).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::ObjectStorage;
use crate::{Error, Result};

pub struct LocalDirStorage {
    root: PathBuf,
    public_base: Option<String>,
}

impl LocalDirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_base: None,
        }
    }

    /// Serve stored objects under `base` instead of `file://` URLs.
    pub fn with_public_base(root: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: Some(base.into().trim_end_matches('/').to_string()),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are storage-internal; reject anything trying to walk out of
        // the root.
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
            return Err(Error::validation(format!("invalid storage key '{key}'")));
        }
        Ok(self.root.join(key))
    }

    fn url_for(&self, key: &str, path: &Path) -> String {
        match &self.public_base {
            Some(base) => format!("{base}/{key}"),
            None => format!("file://{}", path.display()),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalDirStorage {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!(key, content_type, size = bytes.len(), "Stored object");
        Ok(self.url_for(key, &path))
    }

    async fn get(&self, key: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::not_found("StoredObject", key));
        }
        Ok(self.url_for(key, &path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDirStorage::new(dir.path());

        let url = storage
            .put("episodes/abc/audio.mp3", Bytes::from_static(b"123"), "audio/mpeg")
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert_eq!(storage.get("episodes/abc/audio.mp3").await.unwrap(), url);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDirStorage::new(dir.path());
        assert!(matches!(
            storage.get("nope/missing.mp3").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_public_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            LocalDirStorage::with_public_base(dir.path(), "https://cdn.example.com/media/");
        let url = storage
            .put("clips/x.mp3", Bytes::from_static(b"1"), "audio/mpeg")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/media/clips/x.mp3");
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDirStorage::new(dir.path());
        for key in ["../evil", "/abs/path", "a/../../b", ""] {
            assert!(
                storage.put(key, Bytes::new(), "text/plain").await.is_err(),
                "key {key:?} should be rejected"
            );
        }
    }
}

//! Durable object storage abstraction.
//!
//! The pipeline is agnostic to the concrete backend: anything that can
//! `put` bytes under a key and resolve a key back to a URL qualifies.

pub mod local;

pub use local::LocalDirStorage;

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

/// Opaque durable storage for produced media assets.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key` and return a resolvable URL.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String>;

    /// Resolve an existing key to a URL.
    async fn get(&self, key: &str) -> Result<String>;
}

pub mod fs;

use anyhow::Result;
use async_trait::async_trait;

pub use fs::FsBlobStore;

/// A stored object: raw bytes plus the content type recorded at put time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeta {
    pub size: u64,
    pub content_type: String,
}

/// Key-value object store behind the export job and image cache.
///
/// Keys are forward-slash paths ("jobs/job-1/chunk-00000.json"). Writes are
/// atomic from the reader's perspective: a get never observes a partial put.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>>;

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>>;

    /// List keys under a prefix, sorted ascending.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

pub mod document;
pub mod fs;
pub mod in_memory;

pub use document::{ObservationDocument, PointGeometry};
pub use fs::{FsBlobStore, FsDocumentStore};
pub use in_memory::{InMemoryBlobStore, InMemoryDocumentStore};

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Keyed document persistence. `upsert` replaces the whole document stored
/// under `id`, so writing the same document twice is harmless.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert(&self, id: &str, document: serde_json::Value) -> Result<()>;
}

/// Object storage for webcam snapshots
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, metadata: BTreeMap<String, String>) -> Result<()>;

    /// All stored objects, sorted by key
    async fn list(&self) -> Result<Vec<BlobInfo>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlobInfo {
    pub key: String,
    pub size: u64,
    pub metadata: BTreeMap<String, String>,
}

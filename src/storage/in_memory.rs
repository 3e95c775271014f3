use super::{BlobInfo, BlobStore, DocumentStore};
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

fn poisoned<T>(store: &str, _: PoisonError<T>) -> ScraperError {
    ScraperError::Persistence(format!("{} lock poisoned by an earlier panic", store))
}

/// Document store for tests and `--dry-run`
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<HashMap<String, serde_json::Value>>,
    writes: Mutex<usize>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<serde_json::Value> {
        self.documents.lock().ok()?.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .documents
            .lock()
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total upserts, including ones that replaced an existing document
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert(&self, id: &str, document: serde_json::Value) -> Result<()> {
        self.documents
            .lock()
            .map_err(|e| poisoned("document store", e))?
            .insert(id.to_string(), document);
        *self.writes.lock().map_err(|e| poisoned("document store", e))? += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, (Vec<u8>, BTreeMap<String, String>)>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<(Vec<u8>, BTreeMap<String, String>)> {
        self.blobs.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, metadata: BTreeMap<String, String>) -> Result<()> {
        self.blobs
            .lock()
            .map_err(|e| poisoned("blob store", e))?
            .insert(key.to_string(), (bytes, metadata));
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BlobInfo>> {
        let mut listed: Vec<BlobInfo> = self
            .blobs
            .lock()
            .map_err(|e| poisoned("blob store", e))?
            .iter()
            .map(|(key, (bytes, metadata))| BlobInfo {
                key: key.clone(),
                size: bytes.len() as u64,
                metadata: metadata.clone(),
            })
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_is_keyed() {
        let store = InMemoryDocumentStore::new();
        store.upsert("skistar-areby-top", json!({"a": 1})).await.unwrap();
        store.upsert("skistar-areby-top", json!({"a": 2})).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.get("skistar-areby-top"), Some(json!({"a": 2})));
    }

    #[tokio::test]
    async fn test_blob_list_is_sorted() {
        let store = InMemoryBlobStore::new();
        store.put("webcam-storlien.jpg", vec![1, 2], BTreeMap::new()).await.unwrap();
        store.put("airviro-webcam-borga.jpg", vec![1], BTreeMap::new()).await.unwrap();

        let keys: Vec<String> = store.list().await.unwrap().into_iter().map(|b| b.key).collect();
        assert_eq!(keys, vec!["airviro-webcam-borga.jpg", "webcam-storlien.jpg"]);
    }

    #[tokio::test]
    async fn test_poisoned_lock_fails_the_write() {
        let store = InMemoryDocumentStore::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.documents.lock().unwrap();
            panic!("writer died while holding the lock");
        }));

        let err = store.upsert("smhi-132170", json!({})).await.unwrap_err();
        assert!(err.is_run_fatal());
        assert_eq!(store.write_count(), 0);

        let blobs = InMemoryBlobStore::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = blobs.blobs.lock().unwrap();
            panic!("writer died while holding the lock");
        }));
        let err = blobs.put("webcam-helags.jpg", vec![1], BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, ScraperError::Persistence(_)));
        assert!(blobs.list().await.is_err());
    }
}

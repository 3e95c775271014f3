use super::{BlobInfo, BlobStore, DocumentStore};
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const METADATA_SUFFIX: &str = ".meta.json";

/// Document store keeping one JSON file per id under `<root>/<collection>/`.
pub struct FsDocumentStore {
    dir: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl AsRef<Path>, collection: &str) -> Self {
        Self {
            dir: root.as_ref().join(collection),
        }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(id)))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn upsert(&self, id: &str, document: serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&document)?;
        write_atomic(&self.dir, &self.path_for(id), &bytes)
            .await
            .map_err(|e| ScraperError::Persistence(format!("document {}: {}", id, e)))?;
        debug!(id, "Upserted document");
        Ok(())
    }
}

/// Blob store keeping objects under `<root>/<bucket>/`, each with a
/// `<key>.meta.json` sidecar holding its metadata.
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Self {
        Self {
            dir: root.as_ref().join(bucket),
        }
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", encode_key(key), METADATA_SUFFIX))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, metadata: BTreeMap<String, String>) -> Result<()> {
        let path = self.dir.join(encode_key(key));
        let meta = serde_json::to_vec_pretty(&metadata)?;
        let result = async {
            write_atomic(&self.dir, &path, &bytes).await?;
            write_atomic(&self.dir, &self.metadata_path(key), &meta).await
        }
        .await;
        result.map_err(|e| ScraperError::Persistence(format!("blob {}: {}", key, e)))?;
        debug!(key, size = bytes.len(), "Stored blob");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BlobInfo>> {
        let mut blobs = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(blobs),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.ends_with(METADATA_SUFFIX) || file_name.starts_with('.') {
                continue;
            }
            let key = decode_key(&file_name);
            let size = entry.metadata().await?.len();
            let metadata = match fs::read(self.metadata_path(&key)).await {
                Ok(raw) => serde_json::from_slice(&raw)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
                Err(e) => return Err(e.into()),
            };
            blobs.push(BlobInfo { key, size, metadata });
        }

        blobs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(blobs)
    }
}

/// Write to a hidden temp file next to the target, then rename over it.
async fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::create_dir_all(dir).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{}.tmp", file_name));
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await
}

/// Ids come from remote sources; keep each one to a single path segment.
/// Separators, `%`, control characters and a leading dot are percent-encoded,
/// so distinct ids never share a file and stay clear of hidden temp files.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for (i, c) in key.chars().enumerate() {
        if matches!(c, '/' | '\\' | '%') || c.is_control() || (i == 0 && c == '.') {
            let mut buf = [0u8; 4];
            encoded.extend(utf8_percent_encode(c.encode_utf8(&mut buf), NON_ALPHANUMERIC));
        } else {
            encoded.push(c);
        }
    }
    encoded
}

fn decode_key(file_name: &str) -> String {
    percent_decode_str(file_name).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upsert_replaces_existing_document() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path(), "weatherObservations");

        store.upsert("smhi-1", json!({"v": 1})).await.unwrap();
        store.upsert("smhi-1", json!({"v": 2})).await.unwrap();

        let raw = std::fs::read(store.path_for("smhi-1")).unwrap();
        let stored: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored, json!({"v": 2}));
        assert_eq!(std::fs::read_dir(dir.path().join("weatherObservations")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_blob_round_trip_with_metadata() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "webcams");
        let mut metadata = BTreeMap::new();
        metadata.insert("location".to_string(), "[12.5, 62.9]".to_string());

        store.put("webcam-helags.jpg", vec![0xFF, 0xD8, 0xFF], metadata.clone()).await.unwrap();
        store.put("webcam-borga.jpg", vec![0xFF], BTreeMap::new()).await.unwrap();

        let blobs = store.list().await.unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].key, "webcam-borga.jpg");
        assert!(blobs[0].metadata.is_empty());
        assert_eq!(blobs[1].key, "webcam-helags.jpg");
        assert_eq!(blobs[1].size, 3);
        assert_eq!(blobs[1].metadata, metadata);
    }

    #[tokio::test]
    async fn test_list_missing_bucket_is_empty() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "nothing-here");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_encoded_keys_stay_distinct() {
        assert_eq!(encode_key("a/b\\c"), "a%2Fb%5Cc");
        assert_ne!(encode_key("a/b"), encode_key("a_b"));
        assert_ne!(encode_key("a/b"), encode_key("a%2Fb"));
        assert_eq!(encode_key(".."), "%2E.");
        assert_eq!(encode_key("webcam-gevsjön.jpg"), "webcam-gevsjön.jpg");

        for key in ["a/b", "a%2Fb", "..", "tab\there", "webcam-handöl.jpg"] {
            assert_eq!(decode_key(&encode_key(key)), key);
        }
    }

    #[tokio::test]
    async fn test_similar_ids_do_not_overwrite() {
        let dir = tempdir().unwrap();
        let documents = FsDocumentStore::new(dir.path(), "weatherObservations");
        documents.upsert("trafikverket-a/b", json!({"v": 1})).await.unwrap();
        documents.upsert("trafikverket-a_b", json!({"v": 2})).await.unwrap();
        assert_ne!(documents.path_for("trafikverket-a/b"), documents.path_for("trafikverket-a_b"));
        assert_eq!(std::fs::read_dir(dir.path().join("weatherObservations")).unwrap().count(), 2);

        let blobs = FsBlobStore::new(dir.path(), "webcams");
        blobs.put("cam/1.jpg", vec![1], BTreeMap::new()).await.unwrap();
        blobs.put("cam_1.jpg", vec![2, 2], BTreeMap::new()).await.unwrap();
        let listed: Vec<(String, u64)> = blobs.list().await.unwrap().into_iter().map(|b| (b.key, b.size)).collect();
        assert_eq!(listed, vec![("cam/1.jpg".to_string(), 1), ("cam_1.jpg".to_string(), 2)]);
    }
}

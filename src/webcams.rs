//! Webcam snapshots: capture the current frame of every configured camera
//! into the blob store, and list what is stored for the map frontend.

use crate::apis::get_ok;
use crate::apis::skistar::resolve_webcam_image_url;
use crate::app::ports::HttpClientPort;
use crate::constants::LOCATION_METADATA_KEY;
use crate::error::{Result, ScraperError};
use crate::observability::metrics;
use crate::storage::{BlobStore, PointGeometry};
use crate::types::{GeoPoint, ImageSource, WebcamDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

const WEBCAM_SOURCE: &str = "webcam";

/// Serialize a location the way the frontend reads it: `"[lon, lat]"`.
pub fn encode_location(point: GeoPoint) -> String {
    format!("[{}, {}]", point.longitude, point.latitude)
}

#[derive(Deserialize)]
struct LegacyPoint {
    coordinates: Vec<f64>,
}

/// Decode a stored location. Accepts `[lon, lat]` and the older
/// `{"type": "Point", "coordinates": [lon, lat]}` form. `(0, 0)` and
/// anything undecodable come back as unknown.
pub fn decode_location(raw: &str) -> Option<GeoPoint> {
    let coordinates = serde_json::from_str::<Vec<f64>>(raw)
        .or_else(|_| serde_json::from_str::<LegacyPoint>(raw).map(|p| p.coordinates))
        .ok()?;
    match coordinates.as_slice() {
        [lon, lat] => GeoPoint::known(*lat, *lon),
        _ => None,
    }
}

/// Per-camera outcome of a capture run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureSummary {
    pub uploaded: Vec<String>,
    /// `(blob key, reason)` for every camera that was skipped
    pub skipped: Vec<(String, String)>,
}

pub struct WebcamCapture {
    http: Arc<dyn HttpClientPort>,
    store: Arc<dyn BlobStore>,
}

impl WebcamCapture {
    pub fn new(http: Arc<dyn HttpClientPort>, store: Arc<dyn BlobStore>) -> Self {
        Self { http, store }
    }

    /// URL that serves the camera's newest frame
    pub async fn image_url(&self, webcam: &WebcamDescriptor) -> Result<String> {
        match &webcam.image {
            ImageSource::Static(url) => Ok(url.clone()),
            ImageSource::Scraped { page_url } => resolve_webcam_image_url(self.http.as_ref(), page_url).await,
        }
    }

    async fn fetch_image(&self, webcam: &WebcamDescriptor) -> Result<Vec<u8>> {
        let url = self.image_url(webcam).await?;
        let response = get_ok(self.http.as_ref(), WEBCAM_SOURCE, &url).await?;
        if response.bytes.is_empty() {
            return Err(ScraperError::malformed_response(
                WEBCAM_SOURCE,
                format!("{} returned an empty image", url),
            ));
        }
        Ok(response.bytes)
    }

    /// Fetch and store one camera. Returns the stored size.
    pub async fn capture(&self, webcam: &WebcamDescriptor) -> Result<usize> {
        let bytes = self.fetch_image(webcam).await?;
        let size = bytes.len();

        let mut metadata = BTreeMap::new();
        if let Some(location) = webcam.location {
            metadata.insert(LOCATION_METADATA_KEY.to_string(), encode_location(location));
        }

        let key = webcam.blob_key();
        self.store.put(&key, bytes, metadata).await.map_err(|e| match e {
            ScraperError::Persistence(_) => e,
            other => ScraperError::Persistence(format!("{}: {}", key, other)),
        })?;
        Ok(size)
    }

    /// Capture every camera in order. A camera that cannot be fetched is
    /// skipped; a blob store failure aborts.
    pub async fn capture_all(&self, webcams: &[WebcamDescriptor]) -> Result<CaptureSummary> {
        let mut summary = CaptureSummary::default();

        for webcam in webcams {
            let key = webcam.blob_key();
            match self.capture(webcam).await {
                Ok(size) => {
                    info!(key = %key, size, "Uploaded webcam image");
                    metrics::webcams::uploaded(size);
                    summary.uploaded.push(key);
                }
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping webcam");
                    metrics::webcams::skipped();
                    summary.skipped.push((key, e.to_string()));
                }
            }
        }

        info!(
            uploaded = summary.uploaded.len(),
            skipped = summary.skipped.len(),
            "Webcam capture finished"
        );
        Ok(summary)
    }
}

/// One stored snapshot as the frontend consumes it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebcamEntry {
    pub url: String,
    pub location: WebcamFeature,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebcamFeature {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
    pub geometry: Option<PointGeometry>,
    pub properties: WebcamProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebcamProperties {
    pub url: String,
}

/// List stored snapshots with their public URL and decoded location.
pub async fn list_webcams(store: &dyn BlobStore, public_base_url: &str) -> Result<Vec<WebcamEntry>> {
    let base = public_base_url.trim_end_matches('/');
    let entries = store
        .list()
        .await?
        .into_iter()
        .map(|blob| {
            let url = format!("{}/{}", base, blob.key);
            let location = blob
                .metadata
                .get(LOCATION_METADATA_KEY)
                .and_then(|raw| decode_location(raw));
            WebcamEntry {
                url: url.clone(),
                location: WebcamFeature {
                    type_: "Feature".to_string(),
                    id: blob.key,
                    geometry: location.map(PointGeometry::new),
                    properties: WebcamProperties { url },
                },
            }
        })
        .collect();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::testing::CannedHttp;
    use crate::storage::InMemoryBlobStore;

    fn static_cam(id: &str, url: &str, location: Option<GeoPoint>) -> WebcamDescriptor {
        WebcamDescriptor {
            id: id.to_string(),
            key_prefix: "webcam".to_string(),
            location,
            image: ImageSource::Static(url.to_string()),
        }
    }

    #[test]
    fn test_decode_location_formats() {
        assert_eq!(
            decode_location("[12.505582, 62.917014]"),
            Some(GeoPoint::new(62.917014, 12.505582))
        );
        assert_eq!(
            decode_location(r#"{"type": "Point", "coordinates": [15.04, 64.84]}"#),
            Some(GeoPoint::new(64.84, 15.04))
        );
        assert_eq!(decode_location("[0, 0]"), None);
        assert_eq!(decode_location("[1.0]"), None);
        assert_eq!(decode_location("somewhere"), None);
    }

    #[test]
    fn test_encode_decode_location() {
        let helags = GeoPoint::new(62.917014196762445, 12.505582249386759);
        assert_eq!(decode_location(&encode_location(helags)), Some(helags));
    }

    #[tokio::test]
    async fn test_capture_all_skips_failed_fetch() {
        let http = CannedHttp::new()
            .with_bytes("https://cams.test/helags.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0])
            .with("https://cams.test/borga.jpg", 500, "");
        let store = Arc::new(InMemoryBlobStore::new());
        let capture = WebcamCapture::new(Arc::new(http), store.clone());

        let cams = vec![
            static_cam("borga", "https://cams.test/borga.jpg", GeoPoint::known(64.84, 15.04)),
            static_cam("helags", "https://cams.test/helags.jpg", GeoPoint::known(62.917014, 12.505582)),
            static_cam("nowhere", "https://cams.test/nowhere.jpg", None),
        ];
        let summary = capture.capture_all(&cams).await.unwrap();

        assert_eq!(summary.uploaded, vec!["webcam-helags.jpg"]);
        assert_eq!(summary.skipped.len(), 2);

        let (bytes, metadata) = store.get("webcam-helags.jpg").unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(metadata.get("location").map(String::as_str), Some("[12.505582, 62.917014]"));
    }

    #[tokio::test]
    async fn test_unknown_location_omits_metadata() {
        let http = CannedHttp::new().with_bytes("https://cams.test/cam.jpg", vec![1, 2, 3]);
        let store = Arc::new(InMemoryBlobStore::new());
        let capture = WebcamCapture::new(Arc::new(http), store.clone());

        let cam = WebcamDescriptor {
            id: "61".to_string(),
            key_prefix: "skistar-webcam".to_string(),
            location: None,
            image: ImageSource::Static("https://cams.test/cam.jpg".to_string()),
        };
        capture.capture(&cam).await.unwrap();

        let (_, metadata) = store.get("skistar-webcam-61.jpg").unwrap();
        assert!(metadata.is_empty());
    }

    #[tokio::test]
    async fn test_scraped_webcam_resolves_page_first() {
        let page = r#"<input class="fn-lpv-image-data-holder" data-range-mapper-value="23"
                             data-image-url="https://cdn.skistar.test/46/now.jpg?w=50">"#;
        let http = CannedHttp::new()
            .with("https://skistar.test/cam?webcamId=46", 200, page)
            .with_bytes("https://cdn.skistar.test/46/now.jpg", vec![9; 16]);
        let store = Arc::new(InMemoryBlobStore::new());
        let capture = WebcamCapture::new(Arc::new(http), store.clone());

        let cam = WebcamDescriptor {
            id: "46".to_string(),
            key_prefix: "skistar-webcam".to_string(),
            location: GeoPoint::known(64.628695, 12.832031),
            image: ImageSource::Scraped {
                page_url: "https://skistar.test/cam?webcamId=46".to_string(),
            },
        };
        assert_eq!(capture.capture(&cam).await.unwrap(), 16);
        assert!(store.get("skistar-webcam-46.jpg").is_some());
    }

    #[tokio::test]
    async fn test_list_webcams() {
        let store = InMemoryBlobStore::new();
        let mut located = BTreeMap::new();
        located.insert("location".to_string(), "[15.04, 64.84]".to_string());
        let mut legacy = BTreeMap::new();
        legacy.insert("location".to_string(), r#"{"type":"Point","coordinates":[12.5, 62.9]}"#.to_string());
        let mut zero = BTreeMap::new();
        zero.insert("location".to_string(), "[0, 0]".to_string());

        store.put("webcam-borga.jpg", vec![1], located).await.unwrap();
        store.put("webcam-helags.jpg", vec![1], legacy).await.unwrap();
        store.put("skistar-webcam-61.jpg", vec![1], zero).await.unwrap();

        let entries = list_webcams(&store, "https://storage.test/webcams/").await.unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].url, "https://storage.test/webcams/skistar-webcam-61.jpg");
        assert_eq!(entries[0].location.geometry, None);
        assert_eq!(entries[1].location.geometry.as_ref().map(|g| g.coordinates), Some([15.04, 64.84]));
        assert_eq!(entries[2].location.geometry.as_ref().map(|g| g.coordinates), Some([12.5, 62.9]));

        let value = serde_json::to_value(&entries[1]).unwrap();
        assert_eq!(value["location"]["type"], "Feature");
        assert_eq!(value["location"]["properties"]["url"], "https://storage.test/webcams/webcam-borga.jpg");
    }
}

use super::get_ok;
use crate::app::ports::HttpClientPort;
use crate::constants::{observation_id, SMHI_SOURCE};
use crate::error::{Result, ScraperError};
use crate::filtering::{filter_stations, BoundingBox};
use crate::observability::metrics;
use crate::types::{GeoPoint, MeasurementField, Observation, ObservationSource, SourceBatch, Station};
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// SMHI parameter codes this system understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    Temperature,
    WindDirection,
    WindSpeed,
    Humidity,
    SnowDepth,
    Visibility,
    WindGust,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 7] = [
        MeasurementKind::Temperature,
        MeasurementKind::WindDirection,
        MeasurementKind::WindSpeed,
        MeasurementKind::Humidity,
        MeasurementKind::SnowDepth,
        MeasurementKind::Visibility,
        MeasurementKind::WindGust,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(MeasurementKind::Temperature),
            3 => Some(MeasurementKind::WindDirection),
            4 => Some(MeasurementKind::WindSpeed),
            6 => Some(MeasurementKind::Humidity),
            8 => Some(MeasurementKind::SnowDepth),
            12 => Some(MeasurementKind::Visibility),
            21 => Some(MeasurementKind::WindGust),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            MeasurementKind::Temperature => 1,
            MeasurementKind::WindDirection => 3,
            MeasurementKind::WindSpeed => 4,
            MeasurementKind::Humidity => 6,
            MeasurementKind::SnowDepth => 8,
            MeasurementKind::Visibility => 12,
            MeasurementKind::WindGust => 21,
        }
    }

    /// Observation field this kind populates
    pub fn field(&self) -> MeasurementField {
        match self {
            MeasurementKind::Temperature => MeasurementField::Temperature,
            MeasurementKind::WindDirection => MeasurementField::WindDirection,
            MeasurementKind::WindSpeed => MeasurementField::WindSpeed,
            MeasurementKind::Humidity => MeasurementField::Humidity,
            MeasurementKind::SnowDepth => MeasurementField::SnowDepth,
            MeasurementKind::Visibility => MeasurementField::Visibility,
            MeasurementKind::WindGust => MeasurementField::WindGust,
        }
    }

    /// Resolve configured codes, dropping and logging the ones we do not know.
    pub fn from_codes(codes: &[u32]) -> Vec<MeasurementKind> {
        let mut kinds = Vec::new();
        for &code in codes {
            match MeasurementKind::from_code(code) {
                Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
                Some(_) => debug!(code, "Duplicate SMHI measurement kind ignored"),
                None => warn!(code, "Unrecognized SMHI measurement kind, skipping"),
            }
        }
        kinds
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.field(), self.code())
    }
}

// Wire format. Only the fields we use; SMHI sends many more.

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    // Decoded one at a time; a station with a broken entry is dropped alone
    station: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CatalogStation {
    key: String,
    name: String,
    #[serde(default)]
    height: Option<f64>,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    from: Option<i64>,
    #[serde(default)]
    to: Option<i64>,
}

impl From<CatalogStation> for Station {
    fn from(s: CatalogStation) -> Self {
        Station {
            key: s.key,
            name: s.name,
            latitude: s.latitude,
            longitude: s.longitude,
            elevation: s.height,
            active: s.active,
            valid_from: s.from.and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            valid_to: s.to.and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReadingResponse {
    station: ReadingStation,
    #[serde(default)]
    position: Option<Vec<ReadingPosition>>,
    #[serde(default)]
    value: Option<Vec<ReadingValue>>,
}

#[derive(Debug, Deserialize)]
struct ReadingStation {
    key: String,
    name: String,
    #[serde(default)]
    height: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ReadingPosition {
    #[serde(default)]
    height: Option<f64>,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ReadingValue {
    date: i64,
    value: String,
}

fn normalize_base(base_url: &str) -> String {
    if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    }
}

/// Station catalog for one measurement kind, filtered to the area of interest
pub struct SmhiStationDirectory {
    http: Arc<dyn HttpClientPort>,
    base_url: String,
    bounding_box: BoundingBox,
}

impl SmhiStationDirectory {
    pub fn new(http: Arc<dyn HttpClientPort>, base_url: &str, bounding_box: BoundingBox) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            bounding_box,
        }
    }

    pub fn catalog_url(&self, kind: MeasurementKind) -> String {
        format!("{}{}.json", self.base_url, kind.code())
    }

    /// Active stations inside the bounding box that report `kind`
    pub async fn stations(&self, kind: MeasurementKind) -> Result<Vec<Station>> {
        let url = self.catalog_url(kind);
        let response = get_ok(self.http.as_ref(), SMHI_SOURCE, &url).await?;
        let catalog: CatalogResponse = serde_json::from_slice(&response.bytes)
            .map_err(|e| ScraperError::malformed_catalog(SMHI_SOURCE, format!("{}: {}", url, e)))?;

        let total = catalog.station.len();
        let mut decoded = Vec::with_capacity(total);
        for raw in catalog.station {
            match serde_json::from_value::<CatalogStation>(raw) {
                Ok(station) => decoded.push(Station::from(station)),
                Err(e) => warn!(kind = %kind, error = %e, "Skipping undecodable SMHI catalog station"),
            }
        }
        let undecodable = total - decoded.len();
        let stations = filter_stations(decoded, &self.bounding_box);
        info!(kind = %kind, total, undecodable, kept = stations.len(), "Loaded SMHI station catalog");
        Ok(stations)
    }
}

/// Latest-hour readings from SMHI open data
pub struct SmhiAdapter {
    http: Arc<dyn HttpClientPort>,
    directory: SmhiStationDirectory,
    base_url: String,
    kinds: Vec<MeasurementKind>,
}

impl SmhiAdapter {
    pub fn new(
        http: Arc<dyn HttpClientPort>,
        base_url: &str,
        bounding_box: BoundingBox,
        kinds: Vec<MeasurementKind>,
    ) -> Self {
        Self {
            directory: SmhiStationDirectory::new(http.clone(), base_url, bounding_box),
            http,
            base_url: normalize_base(base_url),
            kinds,
        }
    }

    pub fn kinds(&self) -> &[MeasurementKind] {
        &self.kinds
    }

    pub fn reading_url(&self, kind: MeasurementKind, station_key: &str) -> String {
        format!(
            "{}{}/station/{}/period/latest-hour/data.json",
            self.base_url,
            kind.code(),
            station_key
        )
    }

    /// One partial observation carrying a single measurement field
    pub async fn fetch_reading(&self, kind: MeasurementKind, station: &Station) -> Result<Observation> {
        let url = self.reading_url(kind, &station.key);
        let response = get_ok(self.http.as_ref(), SMHI_SOURCE, &url).await?;
        let reading: ReadingResponse = serde_json::from_slice(&response.bytes)
            .map_err(|e| ScraperError::malformed_response(SMHI_SOURCE, format!("{}: {}", url, e)))?;

        // An empty position list falls back to the catalog coordinates
        let position = reading.position.as_deref().and_then(|p| p.first());
        let location = match position {
            Some(p) => GeoPoint::known(p.latitude, p.longitude),
            None => GeoPoint::known(station.latitude, station.longitude),
        };
        let elevation = position
            .and_then(|p| p.height)
            .or(reading.station.height)
            .or(station.elevation);

        let mut obs = Observation::new(observation_id(SMHI_SOURCE, &reading.station.key))
            .with_location(location);
        obs.name = Some(reading.station.name);
        obs.elevation = elevation;

        let latest = reading
            .value
            .unwrap_or_default()
            .into_iter()
            .max_by_key(|v| v.date);
        if let Some(latest) = latest {
            let value = latest
                .value
                .trim()
                .parse::<f64>()
                .map_err(|e| ScraperError::FieldExtraction {
                    field: kind.field().as_str().to_string(),
                    message: format!("station {} value {:?}: {}", station.key, latest.value, e),
                })?;
            *obs.measurement_mut(kind.field()) = Some(value);
            obs.observed_at = Utc.timestamp_millis_opt(latest.date).single();
        } else {
            debug!(station = %station.key, kind = %kind, "No value in the latest hour");
            metrics::sources::field_unknown(SMHI_SOURCE, kind.field().as_str());
        }

        Ok(obs)
    }

    /// Every reading for one kind. Per-station failures are skipped.
    pub async fn fetch_kind(&self, kind: MeasurementKind) -> Result<SourceBatch> {
        let stations = self.directory.stations(kind).await?;
        let mut batch = SourceBatch::default();

        for station in &stations {
            match self.fetch_reading(kind, station).await {
                Ok(obs) => batch.observations.push(obs),
                Err(e) => {
                    warn!(station = %station.key, name = %station.name, kind = %kind, error = %e, "Skipping SMHI station");
                    batch.skipped += 1;
                }
            }
        }
        Ok(batch)
    }
}

#[async_trait::async_trait]
impl ObservationSource for SmhiAdapter {
    fn source_name(&self) -> &'static str {
        SMHI_SOURCE
    }

    async fn fetch_observations(&self) -> Result<SourceBatch> {
        info!(kinds = self.kinds.len(), "Fetching SMHI observations");
        let mut batch = SourceBatch::default();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for &kind in &self.kinds {
            match self.fetch_kind(kind).await {
                Ok(part) => {
                    succeeded += 1;
                    batch.observations.extend(part.observations);
                    batch.skipped += part.skipped;
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "SMHI measurement kind failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => {
                info!(
                    observations = batch.observations.len(),
                    skipped = batch.skipped,
                    "Fetched SMHI observations"
                );
                Ok(batch)
            }
        }
    }
}

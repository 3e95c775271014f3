use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Build a point that is known to be meaningful. `(0, 0)` is the sentinel
    /// operators use for "not geocoded yet", so it maps to `None` together
    /// with non-finite values.
    pub fn known(latitude: f64, longitude: f64) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if latitude == 0.0 && longitude == 0.0 {
            return None;
        }
        Some(Self::new(latitude, longitude))
    }

    /// `[lon, lat]`, the GeoJSON axis order.
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// One normalized reading for one geographic point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub id: String,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub temperature_c: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub wind_gust_speed_ms: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub new_snow_24h_cm: Option<f64>,
    pub new_snow_72h_cm: Option<f64>,
    pub snow_depth_cm: Option<f64>,
    pub visibility_m: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl Observation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.latitude = location.map(|p| p.latitude);
        self.longitude = location.map(|p| p.longitude);
        self
    }

    /// Location, if both axes are known and it is not the `(0, 0)` sentinel.
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => GeoPoint::known(lat, lon),
            _ => None,
        }
    }

    pub fn measurement(&self, field: MeasurementField) -> Option<f64> {
        match field {
            MeasurementField::Temperature => self.temperature_c,
            MeasurementField::WindSpeed => self.wind_speed_ms,
            MeasurementField::WindDirection => self.wind_direction_deg,
            MeasurementField::WindGust => self.wind_gust_speed_ms,
            MeasurementField::Humidity => self.humidity_percent,
            MeasurementField::NewSnow24h => self.new_snow_24h_cm,
            MeasurementField::NewSnow72h => self.new_snow_72h_cm,
            MeasurementField::SnowDepth => self.snow_depth_cm,
            MeasurementField::Visibility => self.visibility_m,
        }
    }

    pub fn measurement_mut(&mut self, field: MeasurementField) -> &mut Option<f64> {
        match field {
            MeasurementField::Temperature => &mut self.temperature_c,
            MeasurementField::WindSpeed => &mut self.wind_speed_ms,
            MeasurementField::WindDirection => &mut self.wind_direction_deg,
            MeasurementField::WindGust => &mut self.wind_gust_speed_ms,
            MeasurementField::Humidity => &mut self.humidity_percent,
            MeasurementField::NewSnow24h => &mut self.new_snow_24h_cm,
            MeasurementField::NewSnow72h => &mut self.new_snow_72h_cm,
            MeasurementField::SnowDepth => &mut self.snow_depth_cm,
            MeasurementField::Visibility => &mut self.visibility_m,
        }
    }

    /// Number of measurement fields that carry a value
    pub fn known_measurements(&self) -> usize {
        MeasurementField::ALL
            .iter()
            .filter(|f| self.measurement(**f).is_some())
            .count()
    }

    /// Reset measurements outside their physical range to unknown and
    /// return the fields that were dropped.
    pub fn discard_implausible(&mut self) -> Vec<MeasurementField> {
        let mut dropped = Vec::new();
        for field in MeasurementField::ALL {
            let slot = self.measurement_mut(field);
            if let Some(value) = *slot {
                if !field.is_plausible(value) {
                    *slot = None;
                    dropped.push(field);
                }
            }
        }
        dropped
    }
}

/// The measurement fields of an [`Observation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementField {
    Temperature,
    WindSpeed,
    WindDirection,
    WindGust,
    Humidity,
    NewSnow24h,
    NewSnow72h,
    SnowDepth,
    Visibility,
}

impl MeasurementField {
    pub const ALL: [MeasurementField; 9] = [
        MeasurementField::Temperature,
        MeasurementField::WindSpeed,
        MeasurementField::WindDirection,
        MeasurementField::WindGust,
        MeasurementField::Humidity,
        MeasurementField::NewSnow24h,
        MeasurementField::NewSnow72h,
        MeasurementField::SnowDepth,
        MeasurementField::Visibility,
    ];

    /// Property name in the persisted document
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementField::Temperature => "temperature_c",
            MeasurementField::WindSpeed => "windSpeed_ms",
            MeasurementField::WindDirection => "windDirection_deg",
            MeasurementField::WindGust => "windGustSpeed_ms",
            MeasurementField::Humidity => "humidity_percent",
            MeasurementField::NewSnow24h => "newSnow24h_cm",
            MeasurementField::NewSnow72h => "newSnow72h_cm",
            MeasurementField::SnowDepth => "snowDepth_cm",
            MeasurementField::Visibility => "visibility_m",
        }
    }

    /// Inclusive range of physically plausible values
    pub fn plausible_range(&self) -> (f64, f64) {
        match self {
            MeasurementField::Temperature => (-60.0, 40.0),
            MeasurementField::Humidity => (0.0, 100.0),
            MeasurementField::WindDirection => (0.0, 360.0),
            MeasurementField::WindSpeed
            | MeasurementField::WindGust
            | MeasurementField::NewSnow24h
            | MeasurementField::NewSnow72h
            | MeasurementField::SnowDepth
            | MeasurementField::Visibility => (0.0, f64::INFINITY),
        }
    }

    pub fn is_plausible(&self, value: f64) -> bool {
        let (min, max) = self.plausible_range();
        value.is_finite() && value >= min && value <= max
    }
}

impl fmt::Display for MeasurementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source catalog entry. Only used for filtering, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub key: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

/// Snow metrics scraped for one resort group
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SnowMeasurement {
    pub snow_depth_cm: Option<f64>,
    pub new_snow_24h_cm: Option<f64>,
    pub new_snow_72h_cm: Option<f64>,
}

/// Snow measurements keyed by resort group id (e.g. `areby`)
pub type SnowReport = HashMap<String, SnowMeasurement>;

/// Everything one source produced during a run
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub observations: Vec<Observation>,
    pub snow: SnowReport,
    /// Records that were dropped because they could not be parsed
    pub skipped: usize,
}

impl SourceBatch {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self {
            observations,
            ..Default::default()
        }
    }
}

/// Where a webcam's current image comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// The URL always serves the newest frame
    Static(String),
    /// The URL has to be scraped from a SkiStar webcam page
    Scraped { page_url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebcamDescriptor {
    pub id: String,
    /// Blob name prefix, e.g. `webcam` or `skistar-webcam`
    pub key_prefix: String,
    pub location: Option<GeoPoint>,
    pub image: ImageSource,
}

impl WebcamDescriptor {
    pub fn blob_key(&self) -> String {
        format!("{}-{}.jpg", self.key_prefix, self.id)
    }
}

/// Core trait that all observation sources implement
#[async_trait::async_trait]
pub trait ObservationSource: Send + Sync {
    /// Unique identifier for this source, also the id prefix
    fn source_name(&self) -> &'static str;

    /// Fetch every observation this source currently offers. An `Err` means
    /// the whole source failed; per-record problems are skipped inside.
    async fn fetch_observations(&self) -> Result<SourceBatch>;
}

//! Persisted shape of an observation.
//!
//! Each observation is stored as a GeoJSON `Feature` with a `Point` geometry
//! in `[lon, lat]` order. Unknown measurements are written as `null` so the
//! map frontend can tell "not reported" apart from zero. An unknown location
//! is a `null` geometry.

use crate::types::{GeoPoint, Observation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const FEATURE_TYPE: &str = "Feature";
const POINT_TYPE: &str = "Point";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationDocument {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
    pub geometry: Option<PointGeometry>,
    pub properties: ObservationProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub type_: String,
    pub coordinates: [f64; 2],
}

impl PointGeometry {
    pub fn new(point: GeoPoint) -> Self {
        Self {
            type_: POINT_TYPE.to_string(),
            coordinates: point.lon_lat(),
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.coordinates[1], self.coordinates[0])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationProperties {
    pub name: Option<String>,
    pub elevation: Option<f64>,
    #[serde(rename = "temperature_c")]
    pub temperature_c: Option<f64>,
    #[serde(rename = "windSpeed_ms")]
    pub wind_speed_ms: Option<f64>,
    #[serde(rename = "windDirection_deg")]
    pub wind_direction_deg: Option<f64>,
    #[serde(rename = "windGustSpeed_ms")]
    pub wind_gust_speed_ms: Option<f64>,
    #[serde(rename = "humidity_percent")]
    pub humidity_percent: Option<f64>,
    #[serde(rename = "newSnow24h_cm")]
    pub new_snow_24h_cm: Option<f64>,
    #[serde(rename = "newSnow72h_cm")]
    pub new_snow_72h_cm: Option<f64>,
    #[serde(rename = "snowDepth_cm")]
    pub snow_depth_cm: Option<f64>,
    #[serde(rename = "visibility_m")]
    pub visibility_m: Option<f64>,
    #[serde(rename = "observedAt")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl ObservationDocument {
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl From<&Observation> for ObservationDocument {
    fn from(obs: &Observation) -> Self {
        Self {
            type_: FEATURE_TYPE.to_string(),
            id: obs.id.clone(),
            geometry: obs.location().map(PointGeometry::new),
            properties: ObservationProperties {
                name: obs.name.clone(),
                elevation: obs.elevation,
                temperature_c: obs.temperature_c,
                wind_speed_ms: obs.wind_speed_ms,
                wind_direction_deg: obs.wind_direction_deg,
                wind_gust_speed_ms: obs.wind_gust_speed_ms,
                humidity_percent: obs.humidity_percent,
                new_snow_24h_cm: obs.new_snow_24h_cm,
                new_snow_72h_cm: obs.new_snow_72h_cm,
                snow_depth_cm: obs.snow_depth_cm,
                visibility_m: obs.visibility_m,
                observed_at: obs.observed_at,
            },
        }
    }
}

impl From<ObservationDocument> for Observation {
    fn from(doc: ObservationDocument) -> Self {
        let p = doc.properties;
        Observation {
            id: doc.id,
            name: p.name,
            elevation: p.elevation,
            temperature_c: p.temperature_c,
            wind_speed_ms: p.wind_speed_ms,
            wind_direction_deg: p.wind_direction_deg,
            wind_gust_speed_ms: p.wind_gust_speed_ms,
            humidity_percent: p.humidity_percent,
            new_snow_24h_cm: p.new_snow_24h_cm,
            new_snow_72h_cm: p.new_snow_72h_cm,
            snow_depth_cm: p.snow_depth_cm,
            visibility_m: p.visibility_m,
            observed_at: p.observed_at,
            ..Default::default()
        }
        .with_location(doc.geometry.map(|g| g.point()))
    }
}

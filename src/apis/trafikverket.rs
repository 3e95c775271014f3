use super::ensure_success;
use crate::app::ports::HttpClientPort;
use crate::constants::{
    observation_id, TRAFIKVERKET_API_URL, TRAFIKVERKET_AUTH_ENV, TRAFIKVERKET_OBJECT_TYPE,
    TRAFIKVERKET_SCHEMA_VERSION, TRAFIKVERKET_SOURCE, TRAFIKVERKET_SWEREF_BOX,
};
use crate::error::{Result, ScraperError};
use crate::types::{GeoPoint, Observation, ObservationSource, SourceBatch};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

static POINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*POINT\s*\(\s*(-?\d+(?:\.\d+)?)\s+(-?\d+(?:\.\d+)?)\s*\)\s*$")
        .expect("WKT point pattern is valid")
});

/// Parse a WKT `POINT (<lon> <lat>)` string.
pub fn parse_wgs84_point(wkt: &str) -> Result<GeoPoint> {
    let caps = POINT_RE
        .captures(wkt)
        .ok_or_else(|| ScraperError::CoordinateParse(wkt.to_string()))?;
    let lon = caps[1]
        .parse::<f64>()
        .map_err(|_| ScraperError::CoordinateParse(wkt.to_string()))?;
    let lat = caps[2]
        .parse::<f64>()
        .map_err(|_| ScraperError::CoordinateParse(wkt.to_string()))?;
    Ok(GeoPoint::new(lat, lon))
}

/// Query parameters for the measure point request
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurepointQuery {
    pub api_url: String,
    pub schema_version: String,
    /// SWEREF99 TM box, `"<x1> <y1>, <x2> <y2>"`
    pub sweref_box: String,
    pub limit: Option<u32>,
}

impl Default for MeasurepointQuery {
    fn default() -> Self {
        Self {
            api_url: TRAFIKVERKET_API_URL.to_string(),
            schema_version: TRAFIKVERKET_SCHEMA_VERSION.to_string(),
            sweref_box: TRAFIKVERKET_SWEREF_BOX.to_string(),
            limit: None,
        }
    }
}

impl MeasurepointQuery {
    pub fn request_body(&self, auth_key: &str) -> String {
        let limit = self
            .limit
            .map(|l| format!(r#" limit="{}""#, l))
            .unwrap_or_default();
        format!(
            r#"<REQUEST>
    <LOGIN authenticationkey="{key}" />
    <QUERY objecttype="{object}" schemaversion="{schema}"{limit}>
        <FILTER>
            <WITHIN name="Geometry.SWEREF99TM" shape="box" value="{bbox}"/>
        </FILTER>
    </QUERY>
</REQUEST>"#,
            key = xml_escape(auth_key),
            object = TRAFIKVERKET_OBJECT_TYPE,
            schema = xml_escape(&self.schema_version),
            limit = limit,
            bbox = xml_escape(&self.sweref_box),
        )
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Read the API key from `var`. Empty counts as missing.
pub fn auth_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}

// Wire format

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(rename = "RESPONSE")]
    response: ResponseBody,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(rename = "RESULT", default)]
    result: Vec<ResultSet>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    // Decoded one at a time so a single odd point cannot sink the batch
    #[serde(rename = "WeatherMeasurepoint", default)]
    points: Vec<serde_json::Value>,
    #[serde(rename = "ERROR")]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "MESSAGE", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Measurepoint {
    id: String,
    name: Option<String>,
    geometry: Option<Geometry>,
    observation: Option<PointObservation>,
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "WGS84")]
    wgs84: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PointObservation {
    sample: Option<String>,
    air: Option<Air>,
    #[serde(default)]
    wind: Vec<Wind>,
    #[serde(rename = "Aggregated10minutes")]
    aggregated_10_minutes: Option<Aggregated>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Air {
    temperature: Option<SensorValue>,
    relative_humidity: Option<SensorValue>,
    visible_distance: Option<SensorValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Wind {
    speed: Option<SensorValue>,
    direction: Option<SensorValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Aggregated {
    wind: Option<AggregatedWind>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AggregatedWind {
    speed_max: Option<SensorValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SensorValue {
    value: Option<f64>,
}

fn value_of(sensor: &Option<SensorValue>) -> Option<f64> {
    sensor.as_ref().and_then(|s| s.value)
}

impl Measurepoint {
    fn into_observation(self) -> Result<Observation> {
        let wkt = self
            .geometry
            .and_then(|g| g.wgs84)
            .ok_or_else(|| ScraperError::CoordinateParse(format!("point {} has no WGS84 geometry", self.id)))?;
        let point = parse_wgs84_point(&wkt)?;

        let mut obs = Observation::new(observation_id(TRAFIKVERKET_SOURCE, &self.id))
            .with_location(GeoPoint::known(point.latitude, point.longitude));
        obs.name = self.name;

        if let Some(o) = self.observation {
            obs.observed_at = o
                .sample
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc));
            if let Some(air) = &o.air {
                obs.temperature_c = value_of(&air.temperature);
                obs.humidity_percent = value_of(&air.relative_humidity);
                obs.visibility_m = value_of(&air.visible_distance);
            }
            // Only the first wind sensor is used
            if let Some(wind) = o.wind.first() {
                obs.wind_speed_ms = value_of(&wind.speed);
                obs.wind_direction_deg = value_of(&wind.direction);
            }
            obs.wind_gust_speed_ms = o
                .aggregated_10_minutes
                .and_then(|a| a.wind)
                .and_then(|w| w.speed_max)
                .and_then(|v| v.value);
        }
        Ok(obs)
    }
}

/// Road weather stations from Trafikverket, fetched in one query
pub struct TrafikverketAdapter {
    http: Arc<dyn HttpClientPort>,
    query: MeasurepointQuery,
    auth_key: Option<String>,
    auth_key_env: String,
}

impl TrafikverketAdapter {
    pub fn new(http: Arc<dyn HttpClientPort>, query: MeasurepointQuery, auth_key: Option<String>) -> Self {
        Self {
            http,
            query,
            auth_key,
            auth_key_env: TRAFIKVERKET_AUTH_ENV.to_string(),
        }
    }

    /// Name of the variable the key was read from, used in error messages
    pub fn with_auth_key_env(mut self, var: &str) -> Self {
        self.auth_key_env = var.to_string();
        self
    }

    fn parse_response(&self, bytes: &[u8]) -> Result<SourceBatch> {
        let parsed: ApiResponse = serde_json::from_slice(bytes)
            .map_err(|e| ScraperError::malformed_response(TRAFIKVERKET_SOURCE, e.to_string()))?;

        let mut batch = SourceBatch::default();
        for result in parsed.response.result {
            if let Some(error) = result.error {
                return Err(ScraperError::unavailable(TRAFIKVERKET_SOURCE, error.message));
            }
            for raw in result.points {
                let point = match serde_json::from_value::<Measurepoint>(raw) {
                    Ok(point) => point,
                    Err(e) => {
                        warn!(error = %e, "Skipping undecodable Trafikverket measure point");
                        batch.skipped += 1;
                        continue;
                    }
                };
                if point.deleted {
                    debug!(id = %point.id, "Skipping deleted measure point");
                    continue;
                }
                let id = point.id.clone();
                match point.into_observation() {
                    Ok(obs) => batch.observations.push(obs),
                    Err(e) => {
                        warn!(id = %id, error = %e, "Skipping Trafikverket measure point");
                        batch.skipped += 1;
                    }
                }
            }
        }
        Ok(batch)
    }
}

#[async_trait::async_trait]
impl ObservationSource for TrafikverketAdapter {
    fn source_name(&self) -> &'static str {
        TRAFIKVERKET_SOURCE
    }

    async fn fetch_observations(&self) -> Result<SourceBatch> {
        let auth_key = self
            .auth_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ScraperError::MissingCredential(self.auth_key_env.clone()))?;

        info!(url = %self.query.api_url, "Fetching Trafikverket measure points");
        let response = self
            .http
            .post(&self.query.api_url, "application/xml", self.query.request_body(auth_key))
            .await
            .map_err(|e| ScraperError::unavailable(TRAFIKVERKET_SOURCE, e))?;
        let response = ensure_success(TRAFIKVERKET_SOURCE, &self.query.api_url, response)?;

        let batch = self.parse_response(&response.bytes)?;
        info!(
            observations = batch.observations.len(),
            skipped = batch.skipped,
            "Fetched Trafikverket observations"
        );
        Ok(batch)
    }
}

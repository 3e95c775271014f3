use super::get_ok;
use crate::app::ports::HttpClientPort;
use crate::constants::{
    observation_id, BOTTOM_SUFFIX, SKISTAR_FORECAST_URL, SKISTAR_LIST_VALUE_SELECTOR, SKISTAR_SNOW_DEPTH_SELECTOR,
    SKISTAR_SOURCE, SKISTAR_TEMPERATURE_SELECTOR, TOP_SUFFIX,
};
use crate::error::{Result, ScraperError};
use crate::observability::metrics;
use crate::parser::{self, FieldPosition};
use crate::types::{GeoPoint, Observation, ObservationSource, SnowMeasurement, SnowReport, SourceBatch};
use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info, warn};

// Forecast page: two temperature labels (top, bottom), then one list value
// per station whose first child is the mean wind and second the gust.
const TOP_TEMPERATURE: FieldPosition = FieldPosition::nth(SKISTAR_TEMPERATURE_SELECTOR, 0);
const BOTTOM_TEMPERATURE: FieldPosition = FieldPosition::nth(SKISTAR_TEMPERATURE_SELECTOR, 1);
const TOP_WIND: FieldPosition = FieldPosition::nth_child(SKISTAR_LIST_VALUE_SELECTOR, 0, 0);
const TOP_GUST: FieldPosition = FieldPosition::nth_child(SKISTAR_LIST_VALUE_SELECTOR, 0, 1);
const BOTTOM_WIND: FieldPosition = FieldPosition::nth_child(SKISTAR_LIST_VALUE_SELECTOR, 1, 0);
const BOTTOM_GUST: FieldPosition = FieldPosition::nth_child(SKISTAR_LIST_VALUE_SELECTOR, 1, 1);

/// One ski area with up to two weather stations
#[derive(Debug, Clone, PartialEq)]
pub struct ResortSite {
    pub id: String,
    pub name: Option<String>,
    pub top: Option<GeoPoint>,
    pub bottom: Option<GeoPoint>,
}

/// Several areas sharing one snow report page. Values on the page are
/// addressed by the area's position in `areas`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnowGroup {
    pub url: String,
    pub areas: Vec<String>,
}

/// Current conditions at one station
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StationWeather {
    pub temperature_c: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_gust_speed_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResortWeather {
    pub top: StationWeather,
    pub bottom: StationWeather,
}

/// Value at `position`, or `None` with the miss logged and counted.
fn field_or_unknown(document: &Html, field: &'static str, position: &FieldPosition) -> Option<f64> {
    match parser::number_at(document, field, position) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(field, error = %e, "SkiStar field unknown");
            metrics::sources::field_unknown(SKISTAR_SOURCE, field);
            None
        }
    }
}

pub fn parse_weather_page(html: &str) -> ResortWeather {
    let doc = Html::parse_document(html);
    ResortWeather {
        top: StationWeather {
            temperature_c: field_or_unknown(&doc, "temperature_c", &TOP_TEMPERATURE),
            wind_speed_ms: field_or_unknown(&doc, "windSpeed_ms", &TOP_WIND),
            wind_gust_speed_ms: field_or_unknown(&doc, "windGustSpeed_ms", &TOP_GUST),
        },
        bottom: StationWeather {
            temperature_c: field_or_unknown(&doc, "temperature_c", &BOTTOM_TEMPERATURE),
            wind_speed_ms: field_or_unknown(&doc, "windSpeed_ms", &BOTTOM_WIND),
            wind_gust_speed_ms: field_or_unknown(&doc, "windGustSpeed_ms", &BOTTOM_GUST),
        },
    }
}

/// Snow figures for each area of a group page. Area `i` owns depth node `i`
/// and list values `2i` (24h) and `2i + 1` (72h).
pub fn parse_snow_page(html: &str, areas: &[String]) -> SnowReport {
    let doc = Html::parse_document(html);
    let mut report = SnowReport::new();

    for (i, area) in areas.iter().enumerate() {
        let measurement = SnowMeasurement {
            snow_depth_cm: field_or_unknown(
                &doc,
                "snowDepth_cm",
                &FieldPosition::nth(SKISTAR_SNOW_DEPTH_SELECTOR, i),
            ),
            new_snow_24h_cm: field_or_unknown(
                &doc,
                "newSnow24h_cm",
                &FieldPosition::nth(SKISTAR_LIST_VALUE_SELECTOR, i * 2),
            ),
            new_snow_72h_cm: field_or_unknown(
                &doc,
                "newSnow72h_cm",
                &FieldPosition::nth(SKISTAR_LIST_VALUE_SELECTOR, i * 2 + 1),
            ),
        };
        report.insert(area.clone(), measurement);
    }
    report
}

/// Observations for the stations a resort actually has
pub fn resort_observations(resort: &ResortSite, weather: &ResortWeather) -> Vec<Observation> {
    let stations = [
        (TOP_SUFFIX, resort.top, weather.top),
        (BOTTOM_SUFFIX, resort.bottom, weather.bottom),
    ];

    stations
        .into_iter()
        .filter_map(|(suffix, location, station)| {
            let location = location?;
            let local_key = format!("{}-{}", resort.id, suffix);
            let mut obs = Observation::new(observation_id(SKISTAR_SOURCE, &local_key))
                .with_location(GeoPoint::known(location.latitude, location.longitude));
            obs.name = resort.name.as_ref().map(|n| format!("{} {}", n, suffix));
            obs.temperature_c = station.temperature_c;
            obs.wind_speed_ms = station.wind_speed_ms;
            obs.wind_gust_speed_ms = station.wind_gust_speed_ms;
            Some(obs)
        })
        .collect()
}

/// Resolve the newest full-size image behind a SkiStar webcam page.
pub async fn resolve_webcam_image_url(http: &dyn HttpClientPort, page_url: &str) -> Result<String> {
    let response = get_ok(http, SKISTAR_SOURCE, page_url).await?;
    parser::latest_webcam_image_url(&response.text()).ok_or_else(|| ScraperError::FieldExtraction {
        field: "webcam image url".to_string(),
        message: format!("no latest frame on {}", page_url),
    })
}

/// Scrapes SkiStar forecast and snow pages
pub struct SkiStarScraper {
    http: Arc<dyn HttpClientPort>,
    forecast_url_template: String,
    resorts: Vec<ResortSite>,
    snow_groups: Vec<SnowGroup>,
}

impl SkiStarScraper {
    pub fn new(http: Arc<dyn HttpClientPort>, resorts: Vec<ResortSite>, snow_groups: Vec<SnowGroup>) -> Self {
        Self {
            http,
            forecast_url_template: SKISTAR_FORECAST_URL.to_string(),
            resorts,
            snow_groups,
        }
    }

    /// Override the forecast page URL; `{id}` is replaced by the resort id.
    pub fn with_forecast_url_template(mut self, template: &str) -> Self {
        self.forecast_url_template = template.to_string();
        self
    }

    pub fn forecast_url(&self, resort_id: &str) -> String {
        self.forecast_url_template.replace("{id}", resort_id)
    }

    async fn fetch_resort(&self, resort: &ResortSite) -> Result<Vec<Observation>> {
        let url = self.forecast_url(&resort.id);
        let response = get_ok(self.http.as_ref(), SKISTAR_SOURCE, &url).await?;
        let weather = parse_weather_page(&response.text());
        Ok(resort_observations(resort, &weather))
    }

    async fn fetch_snow_group(&self, group: &SnowGroup) -> Result<SnowReport> {
        let response = get_ok(self.http.as_ref(), SKISTAR_SOURCE, &group.url).await?;
        Ok(parse_snow_page(&response.text(), &group.areas))
    }
}

#[async_trait::async_trait]
impl ObservationSource for SkiStarScraper {
    fn source_name(&self) -> &'static str {
        SKISTAR_SOURCE
    }

    async fn fetch_observations(&self) -> Result<SourceBatch> {
        info!(
            resorts = self.resorts.len(),
            snow_groups = self.snow_groups.len(),
            "Scraping SkiStar"
        );
        let mut batch = SourceBatch::default();
        let mut last_error = None;
        let mut pages_ok = 0usize;

        for resort in &self.resorts {
            match self.fetch_resort(resort).await {
                Ok(observations) => {
                    pages_ok += 1;
                    batch.observations.extend(observations);
                }
                Err(e) => {
                    warn!(resort = %resort.id, error = %e, "Skipping SkiStar resort");
                    batch.skipped += 1;
                    last_error = Some(e);
                }
            }
        }

        for group in &self.snow_groups {
            match self.fetch_snow_group(group).await {
                Ok(report) => {
                    pages_ok += 1;
                    batch.snow.extend(report);
                }
                Err(e) => {
                    warn!(url = %group.url, error = %e, "Skipping SkiStar snow page");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if pages_ok == 0 => Err(e),
            _ => {
                info!(
                    observations = batch.observations.len(),
                    snow_areas = batch.snow.len(),
                    skipped = batch.skipped,
                    "Scraped SkiStar"
                );
                Ok(batch)
            }
        }
    }
}

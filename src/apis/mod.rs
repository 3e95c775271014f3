pub mod skistar;
pub mod smhi;
pub mod trafikverket;

pub use skistar::SkiStarScraper;
pub use smhi::{MeasurementKind, SmhiAdapter, SmhiStationDirectory};
pub use trafikverket::TrafikverketAdapter;

use crate::app::ports::{HttpClientPort, HttpResponse};
use crate::config::Config;
use crate::constants::{SKISTAR_SOURCE, SMHI_SOURCE, TRAFIKVERKET_SOURCE};
use crate::error::{Result, ScraperError};
use crate::types::ObservationSource;
use std::sync::Arc;
use tracing::info;

/// Build the named source from configuration. `None` for unknown names and
/// for sources switched off in the config.
pub fn create_source(
    name: &str,
    config: &Config,
    http: Arc<dyn HttpClientPort>,
) -> Option<Box<dyn ObservationSource>> {
    match name {
        SMHI_SOURCE if config.smhi.enabled => Some(Box::new(SmhiAdapter::new(
            http,
            &config.smhi.base_url,
            config.smhi.bounding_box,
            MeasurementKind::from_codes(&config.smhi.measurement_kinds),
        ))),
        TRAFIKVERKET_SOURCE if config.trafikverket.enabled => {
            let auth_key_env = &config.trafikverket.auth_key_env;
            let adapter = TrafikverketAdapter::new(
                http,
                config.trafikverket.query(),
                trafikverket::auth_key_from_env(auth_key_env),
            )
            .with_auth_key_env(auth_key_env);
            Some(Box::new(adapter))
        }
        SKISTAR_SOURCE if config.skistar.enabled => Some(Box::new(
            SkiStarScraper::new(http, config.skistar.resort_sites(), config.skistar.snow_groups())
                .with_forecast_url_template(&config.skistar.forecast_url_template),
        )),
        SMHI_SOURCE | TRAFIKVERKET_SOURCE | SKISTAR_SOURCE => {
            info!(source = name, "Source disabled in config");
            None
        }
        _ => None,
    }
}

/// GET `url` and require a success status. Transport errors and non-2xx
/// responses both mean the resource is unavailable.
pub(crate) async fn get_ok(http: &dyn HttpClientPort, source: &str, url: &str) -> Result<HttpResponse> {
    let response = http
        .get(url)
        .await
        .map_err(|e| ScraperError::unavailable(source, format!("GET {}: {}", url, e)))?;
    ensure_success(source, url, response)
}

pub(crate) fn ensure_success(source: &str, url: &str, response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ScraperError::unavailable(
            source,
            format!("{} returned status {}", url, response.status),
        ))
    }
}

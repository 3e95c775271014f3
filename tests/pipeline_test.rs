mod common;

use common::*;
use live_weather::apis::create_source;
use live_weather::app::ports::HttpClientPort;
use live_weather::config::{Config, ResortConfig, SnowGroupConfig};
use live_weather::pipeline::{IngestionPipeline, SourceStatus};
use live_weather::storage::{FsDocumentStore, InMemoryDocumentStore};
use live_weather::types::ObservationSource;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const AUTH_ENV: &str = "LIVE_WEATHER_TEST_TRAFIKVERKET_KEY";

fn test_config() -> Config {
    let mut config = Config::default();
    config.smhi.base_url = SMHI_BASE.to_string();
    config.smhi.measurement_kinds = vec![1, 6];
    config.trafikverket.api_url = TRAFIKVERKET_URL.to_string();
    config.trafikverket.auth_key_env = AUTH_ENV.to_string();
    config.skistar.forecast_url_template = SKISTAR_FORECAST.to_string();
    config.skistar.resorts = vec![ResortConfig {
        id: "areby".to_string(),
        name: Some("Åre By".to_string()),
        top: Some([63.41634525563247, 13.06472146254914]),
        bottom: Some([63.403513916879106, 13.059243790348805]),
    }];
    config.skistar.snow_groups = vec![SnowGroupConfig {
        url: SKISTAR_SNOW.to_string(),
        areas: vec!["areby".to_string()],
    }];
    config
}

fn full_http() -> FakeHttp {
    FakeHttp::new()
        .route(&format!("{}1.json", SMHI_BASE), SMHI_CATALOG)
        .route(&format!("{}6.json", SMHI_BASE), SMHI_CATALOG)
        .route(
            &format!("{}1/station/132170/period/latest-hour/data.json", SMHI_BASE),
            &smhi_reading("-8.1"),
        )
        .route(
            &format!("{}6/station/132170/period/latest-hour/data.json", SMHI_BASE),
            &smhi_reading("87"),
        )
        .route(TRAFIKVERKET_URL, TRAFIKVERKET_BODY)
        .route(&SKISTAR_FORECAST.replace("{id}", "areby"), SKISTAR_FORECAST_PAGE)
        .route(SKISTAR_SNOW, SKISTAR_SNOW_PAGE)
}

fn sources(config: &Config, http: Arc<dyn HttpClientPort>) -> Vec<Box<dyn ObservationSource>> {
    ["smhi", "trafikverket", "skistar"]
        .iter()
        .filter_map(|name| create_source(name, config, http.clone()))
        .collect()
}

fn read_document(store: &FsDocumentStore, id: &str) -> Value {
    let raw = std::fs::read_to_string(store.path_for(id)).expect("document written");
    serde_json::from_str(&raw).expect("valid json")
}

#[tokio::test]
async fn test_all_sources_end_to_end() {
    std::env::set_var(AUTH_ENV, "secret");
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    let store = Arc::new(FsDocumentStore::new(dir.path(), &config.storage.collection));

    let pipeline = IngestionPipeline::new(
        sources(&config, Arc::new(full_http())),
        store.clone(),
        Duration::from_secs(10),
    );
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.failed_sources(), 0);
    assert_eq!(summary.documents_written, 4);

    // Two SMHI kinds for one station collapse into one document
    let smhi = read_document(&store, "smhi-132170");
    assert_eq!(smhi["type"], "Feature");
    assert_eq!(smhi["geometry"]["coordinates"], json!([12.1243, 63.2824]));
    assert_eq!(smhi["properties"]["temperature_c"], json!(-8.1));
    assert_eq!(smhi["properties"]["humidity_percent"], json!(87.0));
    assert_eq!(smhi["properties"]["elevation"], json!(583.0));

    let tv = read_document(&store, "trafikverket-SE_STA_VVIS2301");
    assert_eq!(tv["properties"]["name"], "Tänndalen");
    assert_eq!(tv["properties"]["temperature_c"], json!(-14.2));

    let top = read_document(&store, "skistar-areby-top");
    assert_eq!(top["properties"]["temperature_c"], json!(-2.3));
    assert_eq!(top["properties"]["windGustSpeed_ms"], json!(11.0));
    assert_eq!(top["properties"]["snowDepth_cm"], json!(45.0));
    assert_eq!(top["properties"]["newSnow72h_cm"], json!(8.0));

    let bottom = read_document(&store, "skistar-areby-bottom");
    assert_eq!(bottom["properties"]["temperature_c"], json!(-0.5));
    assert_eq!(bottom["properties"]["windSpeed_ms"], json!(3.0));
    assert!(bottom["properties"]["snowDepth_cm"].is_null());
}

#[tokio::test]
async fn test_rerun_overwrites_documents() {
    std::env::set_var(AUTH_ENV, "secret");
    let config = test_config();
    let store = Arc::new(InMemoryDocumentStore::new());
    let http: Arc<dyn HttpClientPort> = Arc::new(full_http());

    for _ in 0..2 {
        let pipeline = IngestionPipeline::new(sources(&config, http.clone()), store.clone(), Duration::from_secs(10));
        pipeline.run().await.unwrap();
    }

    assert_eq!(store.len(), 4);
    assert_eq!(store.write_count(), 8);
}

#[tokio::test]
async fn test_unreachable_source_is_reported() {
    std::env::set_var(AUTH_ENV, "secret");
    let config = test_config();
    let store = Arc::new(InMemoryDocumentStore::new());
    let http = FakeHttp::new()
        .route(&SKISTAR_FORECAST.replace("{id}", "areby"), SKISTAR_FORECAST_PAGE)
        .route(SKISTAR_SNOW, SKISTAR_SNOW_PAGE)
        .route_status(TRAFIKVERKET_URL, 503);

    let pipeline = IngestionPipeline::new(sources(&config, Arc::new(http)), store.clone(), Duration::from_secs(10));
    let summary = pipeline.run().await.unwrap();

    let statuses: Vec<(String, SourceStatus)> =
        summary.sources.iter().map(|s| (s.source.clone(), s.status)).collect();
    assert_eq!(
        statuses,
        vec![
            ("smhi".to_string(), SourceStatus::Failed),
            ("trafikverket".to_string(), SourceStatus::Failed),
            ("skistar".to_string(), SourceStatus::Ok),
        ]
    );
    assert!(!summary.is_failure());
    assert_eq!(store.ids(), vec!["skistar-areby-bottom", "skistar-areby-top"]);
}

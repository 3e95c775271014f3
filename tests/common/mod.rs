#![allow(dead_code)]

use async_trait::async_trait;
use live_weather::app::ports::{HttpClientPort, HttpResponse};
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves canned bodies by URL; anything else is a 404.
#[derive(Default)]
pub struct FakeHttp {
    routes: HashMap<String, (u16, Vec<u8>)>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, body: &str) -> Self {
        self.routes.insert(url.to_string(), (200, body.as_bytes().to_vec()));
        self
    }

    pub fn route_bytes(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.routes.insert(url.to_string(), (200, bytes));
        self
    }

    pub fn route_status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(url.to_string(), (status, Vec::new()));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn respond(&self, url: &str) -> HttpResponse {
        self.requested.lock().unwrap().push(url.to_string());
        let (status, bytes) = self.routes.get(url).cloned().unwrap_or((404, Vec::new()));
        HttpResponse {
            status,
            bytes,
            content_type: "application/octet-stream".to_string(),
        }
    }
}

#[async_trait]
impl HttpClientPort for FakeHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, String> {
        Ok(self.respond(url))
    }

    async fn post(&self, url: &str, _content_type: &str, _body: String) -> Result<HttpResponse, String> {
        Ok(self.respond(url))
    }
}

pub const SMHI_BASE: &str = "https://smhi.test/parameter/";
pub const TRAFIKVERKET_URL: &str = "https://trafikverket.test/data.json";
pub const SKISTAR_FORECAST: &str = "https://skistar.test/forecast?area={id}";
pub const SKISTAR_SNOW: &str = "https://skistar.test/snow?area=areby";

pub const SMHI_CATALOG: &str = r#"{
    "key": "1",
    "station": [
        {"key": "132170", "name": "Storlien-Storvallen A", "id": 132170, "height": 583.0,
         "latitude": 63.2824, "longitude": 12.1243, "active": true}
    ]
}"#;

pub fn smhi_reading(value: &str) -> String {
    format!(
        r#"{{"station": {{"key": "132170", "name": "Storlien-Storvallen A", "height": 583.0}},
            "position": [{{"height": 583.0, "latitude": 63.2824, "longitude": 12.1243}}],
            "value": [{{"date": 1706000400000, "value": "{}", "quality": "G"}}]}}"#,
        value
    )
}

pub const TRAFIKVERKET_BODY: &str = r#"{"RESPONSE": {"RESULT": [{"WeatherMeasurepoint": [
    {"Id": "SE_STA_VVIS2301", "Name": "Tänndalen",
     "Geometry": {"WGS84": "POINT (12.3141 62.5542)"},
     "Observation": {
        "Sample": "2024-01-23T10:10:00.000+01:00",
        "Air": {"Temperature": {"Value": -14.2}, "RelativeHumidity": {"Value": 91.0}}
     }}
]}]}}"#;

pub const SKISTAR_FORECAST_PAGE: &str = r#"
    <div class="lpv-info-weather__text">-2.3 °C</div>
    <div class="lpv-info-weather__text">−0.5 °C</div>
    <ul>
        <li class="lpv-info-list__value"><span>6 m/s</span><span>11 m/s</span></li>
        <li class="lpv-info-list__value"><span>3 m/s</span><span>7 m/s</span></li>
    </ul>
"#;

pub const SKISTAR_SNOW_PAGE: &str = r#"
    <span class="lpv-info-snow__value-number">45</span>
    <span class="lpv-info-list__value">2 cm</span>
    <span class="lpv-info-list__value">8 cm</span>
"#;

use crate::apis::skistar::{ResortSite, SnowGroup};
use crate::apis::trafikverket::MeasurepointQuery;
use crate::constants::{
    OBSERVATIONS_COLLECTION, SKISTAR_FORECAST_URL, SKISTAR_SNOW_URL, SKISTAR_WEBCAM_URL, SMHI_API_URL,
    TRAFIKVERKET_API_URL, TRAFIKVERKET_AUTH_ENV, TRAFIKVERKET_SCHEMA_VERSION, TRAFIKVERKET_SWEREF_BOX,
};
use crate::error::{Result, ScraperError};
use crate::filtering::BoundingBox;
use crate::types::{GeoPoint, ImageSource, WebcamDescriptor};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub smhi: SmhiConfig,
    pub trafikverket: TrafikverketConfig,
    pub skistar: SkiStarConfig,
    pub webcams: Vec<WebcamConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    /// Upper bound for one source's whole fetch
    pub source_deadline_seconds: u64,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub collection: String,
    pub bucket: String,
    /// Prefix for webcam URLs in listings; defaults to a `file://` URL of the bucket
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmhiConfig {
    pub enabled: bool,
    pub base_url: String,
    pub measurement_kinds: Vec<u32>,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrafikverketConfig {
    pub enabled: bool,
    pub api_url: String,
    pub schema_version: String,
    pub auth_key_env: String,
    pub sweref_box: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SkiStarConfig {
    pub enabled: bool,
    /// `{id}` is replaced by the resort id
    pub forecast_url_template: String,
    pub resorts: Vec<ResortConfig>,
    pub snow_groups: Vec<SnowGroupConfig>,
    /// `{id}` is replaced by the SkiStar webcam id
    pub webcam_page_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResortConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// `[lat, lon]`
    #[serde(default)]
    pub top: Option<[f64; 2]>,
    /// `[lat, lon]`
    #[serde(default)]
    pub bottom: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SnowGroupConfig {
    pub url: String,
    /// Resort ids in the order their values appear on the page
    pub areas: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WebcamConfig {
    pub id: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// `[lon, lat]`
    #[serde(default)]
    pub location: Option<[f64; 2]>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub skistar_webcam_id: Option<String>,
}

fn default_key_prefix() -> String {
    "webcam".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 15,
            source_deadline_seconds: 120,
            user_agent: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            collection: OBSERVATIONS_COLLECTION.to_string(),
            bucket: "webcams".to_string(),
            public_base_url: None,
        }
    }
}

impl StorageConfig {
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.clone(),
            None => format!("file://{}", self.root.join(&self.bucket).display()),
        }
    }
}

impl Default for SmhiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: SMHI_API_URL.to_string(),
            measurement_kinds: vec![1, 3, 4, 6, 8, 12, 21],
            bounding_box: BoundingBox::JAMTLAND,
        }
    }
}

impl Default for TrafikverketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: TRAFIKVERKET_API_URL.to_string(),
            schema_version: TRAFIKVERKET_SCHEMA_VERSION.to_string(),
            auth_key_env: TRAFIKVERKET_AUTH_ENV.to_string(),
            sweref_box: TRAFIKVERKET_SWEREF_BOX.to_string(),
            limit: None,
        }
    }
}

impl TrafikverketConfig {
    pub fn query(&self) -> MeasurepointQuery {
        MeasurepointQuery {
            api_url: self.api_url.clone(),
            schema_version: self.schema_version.clone(),
            sweref_box: self.sweref_box.clone(),
            limit: self.limit,
        }
    }
}

fn resort(id: &str, top: [f64; 2], bottom: Option<[f64; 2]>) -> ResortConfig {
    ResortConfig {
        id: id.to_string(),
        name: None,
        top: Some(top),
        bottom,
    }
}

fn snow_group(page_area: &str, areas: &[&str]) -> SnowGroupConfig {
    SnowGroupConfig {
        url: SKISTAR_SNOW_URL.replace("{id}", page_area),
        areas: areas.iter().map(|a| a.to_string()).collect(),
    }
}

impl Default for SkiStarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            forecast_url_template: SKISTAR_FORECAST_URL.to_string(),
            resorts: vec![
                resort("areby", [63.41634525563247, 13.06472146254914], Some([63.403513916879106, 13.059243790348805])),
                resort("hogzon", [63.42746531861163, 13.07798918790169], None),
                resort("bjornen", [63.40397330198576, 13.112439722480248], Some([63.39058903591519, 13.124520371380962])),
                resort("duved", [63.40925052213198, 12.933974437408123], Some([63.39653432268454, 12.924465636198212])),
                resort("vemdalsskalet", [62.483387, 13.956566], Some([62.484503, 13.967102])),
                resort("bjornrike", [62.41864, 13.98688], Some([62.42142, 13.95809])),
                resort("klovsjostorhogna", [62.49811, 14.09203], Some([62.49464, 14.11936])),
            ],
            // Every area of a destination shares one snow page
            snow_groups: vec![
                snow_group("areby", &["areby", "hogzon", "duved", "bjornen"]),
                snow_group("vemdalsskalet", &["bjornrike", "vemdalsskalet", "klovsjostorhogna"]),
            ],
            webcam_page_url: SKISTAR_WEBCAM_URL.to_string(),
        }
    }
}

impl SkiStarConfig {
    pub fn resort_sites(&self) -> Vec<ResortSite> {
        self.resorts
            .iter()
            .map(|r| ResortSite {
                id: r.id.clone(),
                name: r.name.clone(),
                top: r.top.and_then(|[lat, lon]| GeoPoint::known(lat, lon)),
                bottom: r.bottom.and_then(|[lat, lon]| GeoPoint::known(lat, lon)),
            })
            .collect()
    }

    pub fn snow_groups(&self) -> Vec<SnowGroup> {
        self.snow_groups
            .iter()
            .map(|g| SnowGroup {
                url: g.url.clone(),
                areas: g.areas.clone(),
            })
            .collect()
    }
}

fn static_cam(id: &str, lon: f64, lat: f64, image_url: &str) -> WebcamConfig {
    WebcamConfig {
        id: id.to_string(),
        key_prefix: default_key_prefix(),
        location: Some([lon, lat]),
        image_url: Some(image_url.to_string()),
        skistar_webcam_id: None,
    }
}

fn road_cam(id: &str, lon: f64, lat: f64, camera: u64) -> WebcamConfig {
    static_cam(
        id,
        lon,
        lat,
        &format!(
            "https://api.trafikinfo.trafikverket.se/v2/Images/RoadConditionCamera_{}.Jpeg?type=fullsize&maxage=140",
            camera
        ),
    )
}

fn airviro_cam(id: &str, lon: f64, lat: f64) -> WebcamConfig {
    static_cam(id, lon, lat, &format!("https://www.airviro.com/{}/webcam/latestimg.jpg", id))
}

fn skistar_cam(id: &str, location: Option<[f64; 2]>) -> WebcamConfig {
    WebcamConfig {
        id: id.to_string(),
        key_prefix: "skistar-webcam".to_string(),
        location,
        image_url: None,
        skistar_webcam_id: Some(id.to_string()),
    }
}

fn default_webcams() -> Vec<WebcamConfig> {
    let mut cams = vec![
        airviro_cam("borga", 15.03789571840728, 64.84199155484801),
        airviro_cam("helags", 12.505582249386759, 62.917014196762445),
        airviro_cam("ramundberget", 12.37264481898198, 62.69248269325625),
        airviro_cam("bydalen", 13.75263354936005, 63.10759607237622),
        road_cam("trillevallen", 13.206262037974694, 63.25443937020817, 39635528),
        road_cam("gevsjön", 12.702011476723557, 63.36705212550013, 39635384),
        road_cam("handöl", 12.382941421804786, 63.26835926669674, 39635520),
        road_cam("medstugan", 12.407996503920517, 63.519546112666376, 39626819),
        road_cam("storlien", 12.088252196720449, 63.31759038262924, 39636227),
        static_cam(
            "nedalshytta",
            12.101315126910368,
            62.97826646239796,
            "https://metnet.no/custcams/nedalshytta/laget/webcam_hd.jpg",
        ),
        static_cam(
            "meråker",
            11.679622045416139,
            63.456829044603644,
            "https://metnet.no/custcams/merakeralpin2/laget/webcam_hd.jpg",
        ),
        skistar_cam("46", Some([12.832031, 64.628695])),
    ];
    // Not geocoded yet
    for id in ["61", "62", "63", "77", "44", "60", "45", "49"] {
        cams.push(skistar_cam(id, None));
    }
    cams
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            smhi: SmhiConfig::default(),
            trafikverket: TrafikverketConfig::default(),
            skistar: SkiStarConfig::default(),
            webcams: default_webcams(),
        }
    }
}

impl WebcamConfig {
    pub fn descriptor(&self, skistar_page_url: &str) -> Result<WebcamDescriptor> {
        let image = match (&self.image_url, &self.skistar_webcam_id) {
            (Some(url), None) => ImageSource::Static(url.clone()),
            (None, Some(cam_id)) => ImageSource::Scraped {
                page_url: skistar_page_url.replace("{id}", cam_id),
            },
            _ => {
                return Err(ScraperError::Config(format!(
                    "webcam {} needs exactly one of image_url or skistar_webcam_id",
                    self.id
                )))
            }
        };
        Ok(WebcamDescriptor {
            id: self.id.clone(),
            key_prefix: self.key_prefix.clone(),
            location: self.location.and_then(|[lon, lat]| GeoPoint::known(lat, lon)),
            image,
        })
    }
}

impl Config {
    /// Load from `path`, else `config.toml` when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?,
            None => {
                info!("No config file, using built-in defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_seconds == 0 || self.http.source_deadline_seconds == 0 {
            return Err(ScraperError::Config("http timeouts must be positive".to_string()));
        }
        let bbox = &self.smhi.bounding_box;
        if bbox.min_latitude > bbox.max_latitude || bbox.min_longitude > bbox.max_longitude {
            return Err(ScraperError::Config("smhi bounding box has min above max".to_string()));
        }
        self.webcam_descriptors()?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    pub fn source_deadline(&self) -> Duration {
        Duration::from_secs(self.http.source_deadline_seconds)
    }

    pub fn webcam_descriptors(&self) -> Result<Vec<WebcamDescriptor>> {
        self.webcams
            .iter()
            .map(|w| w.descriptor(&self.skistar.webcam_page_url))
            .collect()
    }
}

/// Source names and the identifier prefixes derived from them.
/// Every persisted document id starts with one of these prefixes.

pub const SMHI_SOURCE: &str = "smhi";
pub const TRAFIKVERKET_SOURCE: &str = "trafikverket";
pub const SKISTAR_SOURCE: &str = "skistar";

/// Suffixes for the two stations of a ski resort
pub const TOP_SUFFIX: &str = "top";
pub const BOTTOM_SUFFIX: &str = "bottom";

/// Document collection the map frontend subscribes to
pub const OBSERVATIONS_COLLECTION: &str = "weatherObservations";

/// Blob metadata key holding the serialized `[lon, lat]` pair
pub const LOCATION_METADATA_KEY: &str = "location";

// SMHI open data
pub const SMHI_API_URL: &str = "https://opendata-download-metobs.smhi.se/api/version/1.0/parameter/";

// Trafikverket open API
pub const TRAFIKVERKET_API_URL: &str = "https://api.trafikinfo.trafikverket.se/v2/data.json";
pub const TRAFIKVERKET_AUTH_ENV: &str = "TRAFIKVERKET_AUTH_KEY";
pub const TRAFIKVERKET_OBJECT_TYPE: &str = "WeatherMeasurepoint";
pub const TRAFIKVERKET_SCHEMA_VERSION: &str = "2.1";
/// SWEREF99 TM box covering Jämtland and Härjedalen
pub const TRAFIKVERKET_SWEREF_BOX: &str = "311863 6858375, 552124 7169867";

// SkiStar pages
pub const SKISTAR_FORECAST_URL: &str = "https://www.skistar.com/Lpv/Forecast?lang=sv&area={id}";
pub const SKISTAR_SNOW_URL: &str = "https://www.skistar.com/Lpv/SnowGraph?lang=sv&area={id}";
pub const SKISTAR_WEBCAM_URL: &str = "https://www.skistar.com/sv/vara-skidorter/are/vinter-i-are/vader-och-backar/webbkameror-are/WebCam/?webcamId={id}";

/// SkiStar CSS classes. The pages carry no ids, so values are addressed by
/// the ordinal position of these nodes.
pub const SKISTAR_TEMPERATURE_SELECTOR: &str = ".lpv-info-weather__text";
pub const SKISTAR_LIST_VALUE_SELECTOR: &str = ".lpv-info-list__value";
pub const SKISTAR_SNOW_DEPTH_SELECTOR: &str = ".lpv-info-snow__value-number";
pub const SKISTAR_WEBCAM_FRAME_SELECTOR: &str = "input.fn-lpv-image-data-holder";
pub const SKISTAR_WEBCAM_RANGE_ATTR: &str = "data-range-mapper-value";
pub const SKISTAR_WEBCAM_IMAGE_ATTR: &str = "data-image-url";
/// The webcam slider holds the last 24 hourly frames; 23 is the newest.
pub const SKISTAR_LATEST_FRAME: &str = "23";
/// Length of the thumbnail suffix stripped to get the full-size image URL
pub const SKISTAR_THUMBNAIL_SUFFIX_LEN: usize = 5;

pub const USER_AGENT: &str = "live_weather/0.1 (+https://weather.erikmagnusson.com)";

/// Build a source-prefixed observation id, e.g. `smhi-159880`.
pub fn observation_id(source: &str, local_key: &str) -> String {
    format!("{}-{}", source, local_key)
}

/// Get all supported source names
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![SMHI_SOURCE, TRAFIKVERKET_SOURCE, SKISTAR_SOURCE]
}

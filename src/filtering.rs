use crate::types::Station;
use serde::{Deserialize, Serialize};

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub const fn new(min_latitude: f64, min_longitude: f64, max_latitude: f64, max_longitude: f64) -> Self {
        Self {
            min_latitude,
            min_longitude,
            max_latitude,
            max_longitude,
        }
    }

    /// The mountain region of Jämtland and Härjedalen
    pub const JAMTLAND: BoundingBox = BoundingBox::new(
        61.72869520035822,
        11.91821627146622,
        64.42201973845242,
        18.493133525180227,
    );
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::JAMTLAND
    }
}

/// Inclusive on all four edges.
pub fn is_within(latitude: f64, longitude: f64, bbox: &BoundingBox) -> bool {
    latitude >= bbox.min_latitude
        && latitude <= bbox.max_latitude
        && longitude >= bbox.min_longitude
        && longitude <= bbox.max_longitude
}

/// Keep active stations inside the box, preserving catalog order.
pub fn filter_stations(stations: Vec<Station>, bbox: &BoundingBox) -> Vec<Station> {
    stations
        .into_iter()
        .filter(|s| s.active && is_within(s.latitude, s.longitude, bbox))
        .collect()
}

use crate::constants::{SKISTAR_SOURCE, TOP_SUFFIX};
use crate::types::{MeasurementField, Observation, SnowMeasurement, SnowReport};
use std::collections::HashMap;
use tracing::debug;

/// Combines partial observations. Every merge only fills fields that are
/// still unknown, so applying it twice changes nothing.
pub struct ObservationMerger;

impl ObservationMerger {
    /// Collapse observations sharing an id into one, keeping first-seen order.
    pub fn merge_partials(observations: Vec<Observation>) -> Vec<Observation> {
        let mut merged: Vec<Observation> = Vec::with_capacity(observations.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for obs in observations {
            match index.get(&obs.id) {
                Some(&i) => Self::fill_from(&mut merged[i], &obs),
                None => {
                    index.insert(obs.id.clone(), merged.len());
                    merged.push(obs);
                }
            }
        }
        merged
    }

    /// Copy every unknown field of `target` from `other`.
    pub fn fill_from(target: &mut Observation, other: &Observation) {
        if target.name.is_none() {
            target.name = other.name.clone();
        }
        if target.location().is_none() {
            if let Some(location) = other.location() {
                target.latitude = Some(location.latitude);
                target.longitude = Some(location.longitude);
            }
        }
        if target.elevation.is_none() {
            target.elevation = other.elevation;
        }
        for field in MeasurementField::ALL {
            let slot = target.measurement_mut(field);
            if slot.is_none() {
                *slot = other.measurement(field);
            }
        }
        target.observed_at = match (target.observed_at, other.observed_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// Resort group an id belongs to when it names a top station,
    /// e.g. `skistar-areby-top` gives `areby`.
    pub fn snow_group_of(id: &str) -> Option<&str> {
        id.strip_prefix(SKISTAR_SOURCE)?
            .strip_prefix('-')?
            .strip_suffix(TOP_SUFFIX)?
            .strip_suffix('-')
            .filter(|group| !group.is_empty())
    }

    /// Fill snow figures of top stations from their group's measurement.
    /// Returns how many observations received a report.
    pub fn merge_snow(observations: &mut [Observation], snow: &SnowReport) -> usize {
        let mut applied = 0;
        for obs in observations.iter_mut() {
            let Some(measurement) = Self::snow_group_of(&obs.id).and_then(|g| snow.get(g)) else {
                continue;
            };
            Self::apply_snow(obs, measurement);
            applied += 1;
        }
        debug!(applied, groups = snow.len(), "Merged snow reports");
        applied
    }

    fn apply_snow(obs: &mut Observation, snow: &SnowMeasurement) {
        if obs.snow_depth_cm.is_none() {
            obs.snow_depth_cm = snow.snow_depth_cm;
        }
        if obs.new_snow_24h_cm.is_none() {
            obs.new_snow_24h_cm = snow.new_snow_24h_cm;
        }
        if obs.new_snow_72h_cm.is_none() {
            obs.new_snow_72h_cm = snow.new_snow_72h_cm;
        }
    }
}

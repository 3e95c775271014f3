//! Metrics for the ingestion run
//!
//! Counters are recorded through the `metrics` facade. Until `init()` installs
//! the Prometheus recorder every call is a no-op, so library code and tests
//! record unconditionally.

use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// All metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Sources
    SourceObservations,
    SourceRecordsSkipped,
    SourceFieldsUnknown,
    SourceFailures,
    SourceDuration,

    // Pipeline
    PipelineDocumentsUpserted,
    PipelineValuesDiscarded,

    // Webcams
    WebcamsUploaded,
    WebcamsSkipped,
    WebcamBytes,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourceObservations => "live_weather_source_observations_total",
            MetricName::SourceRecordsSkipped => "live_weather_source_records_skipped_total",
            MetricName::SourceFieldsUnknown => "live_weather_source_fields_unknown_total",
            MetricName::SourceFailures => "live_weather_source_failures_total",
            MetricName::SourceDuration => "live_weather_source_duration_seconds",
            MetricName::PipelineDocumentsUpserted => "live_weather_documents_upserted_total",
            MetricName::PipelineValuesDiscarded => "live_weather_values_discarded_total",
            MetricName::WebcamsUploaded => "live_weather_webcams_uploaded_total",
            MetricName::WebcamsSkipped => "live_weather_webcams_skipped_total",
            MetricName::WebcamBytes => "live_weather_webcam_bytes",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            SourceObservations,
            SourceRecordsSkipped,
            SourceFieldsUnknown,
            SourceFailures,
            SourceDuration,
            PipelineDocumentsUpserted,
            PipelineValuesDiscarded,
            WebcamsUploaded,
            WebcamsSkipped,
            WebcamBytes,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is an error.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE
        .set(handle)
        .map_err(|_| "Metrics recorder already initialized")?;
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus exposition text, or `None` when no recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Sources Metrics
// ============================================================================

pub mod sources {
    use super::MetricName;

    pub fn observations(source: &'static str, count: usize) {
        ::metrics::counter!(MetricName::SourceObservations.as_str(), "source" => source)
            .increment(count as u64);
    }

    pub fn records_skipped(source: &'static str, count: usize) {
        ::metrics::counter!(MetricName::SourceRecordsSkipped.as_str(), "source" => source)
            .increment(count as u64);
    }

    /// A positional or parsed field that came back empty
    pub fn field_unknown(source: &'static str, field: &'static str) {
        ::metrics::counter!(
            MetricName::SourceFieldsUnknown.as_str(),
            "source" => source,
            "field" => field
        )
        .increment(1);
    }

    pub fn failure(source: &'static str) {
        ::metrics::counter!(MetricName::SourceFailures.as_str(), "source" => source).increment(1);
    }

    pub fn duration(source: &'static str, secs: f64) {
        ::metrics::histogram!(MetricName::SourceDuration.as_str(), "source" => source).record(secs);
    }
}

// ============================================================================
// Pipeline Metrics
// ============================================================================

pub mod pipeline {
    use super::MetricName;

    pub fn document_upserted() {
        ::metrics::counter!(MetricName::PipelineDocumentsUpserted.as_str()).increment(1);
    }

    /// A measurement dropped by the plausibility gate
    pub fn value_discarded(field: &'static str) {
        ::metrics::counter!(MetricName::PipelineValuesDiscarded.as_str(), "field" => field)
            .increment(1);
    }
}

// ============================================================================
// Webcam Metrics
// ============================================================================

pub mod webcams {
    use super::MetricName;

    pub fn uploaded(bytes: usize) {
        ::metrics::counter!(MetricName::WebcamsUploaded.as_str()).increment(1);
        ::metrics::histogram!(MetricName::WebcamBytes.as_str()).record(bytes as f64);
    }

    pub fn skipped() {
        ::metrics::counter!(MetricName::WebcamsSkipped.as_str()).increment(1);
    }
}

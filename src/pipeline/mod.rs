// Ingestion pipeline: fetch every source, merge, persist

pub mod merge;

pub use merge::ObservationMerger;

use crate::error::{Result, ScraperError};
use crate::observability::metrics;
use crate::storage::{DocumentStore, ObservationDocument};
use crate::types::{Observation, ObservationSource, SnowReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed,
    TimedOut,
}

/// How one source fared during a run
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub status: SourceStatus,
    pub observations: usize,
    pub skipped: usize,
    pub error: Option<String>,
    pub duration_secs: f64,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub documents_written: usize,
    pub values_discarded: usize,
    pub sources: Vec<SourceReport>,
}

impl RunSummary {
    pub fn failed_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.status != SourceStatus::Ok)
            .count()
    }

    /// A run where no source produced anything counts as failed.
    pub fn is_failure(&self) -> bool {
        !self.sources.is_empty() && self.failed_sources() == self.sources.len()
    }
}

/// Everything gathered from the sources before merging
#[derive(Debug, Default)]
pub struct Collected {
    pub observations: Vec<Observation>,
    pub snow: SnowReport,
    pub reports: Vec<SourceReport>,
}

pub struct IngestionPipeline {
    sources: Vec<Box<dyn ObservationSource>>,
    store: Arc<dyn DocumentStore>,
    source_deadline: Duration,
}

impl IngestionPipeline {
    pub fn new(
        sources: Vec<Box<dyn ObservationSource>>,
        store: Arc<dyn DocumentStore>,
        source_deadline: Duration,
    ) -> Self {
        Self {
            sources,
            store,
            source_deadline,
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.source_name()).collect()
    }

    /// Run every source in order, merge, and upsert. Source failures are
    /// recorded in the summary; only a persistence failure is an `Err`.
    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        info!("Starting ingestion run");

        let collected = self.collect().await?;
        let (observations, values_discarded) = Self::prepare(collected.observations, &collected.snow);
        let documents_written = self.persist(&observations).await?;

        let summary = RunSummary {
            started_at,
            documents_written,
            values_discarded,
            sources: collected.reports,
        };
        info!(
            documents_written,
            values_discarded,
            failed_sources = summary.failed_sources(),
            "Ingestion run finished"
        );
        Ok(summary)
    }

    /// Fetch from every source, each under the overall deadline.
    pub async fn collect(&self) -> Result<Collected> {
        let mut collected = Collected::default();

        for source in &self.sources {
            let name = source.source_name();
            let started = Instant::now();
            let outcome = tokio::time::timeout(self.source_deadline, source.fetch_observations()).await;
            let duration_secs = started.elapsed().as_secs_f64();
            metrics::sources::duration(name, duration_secs);

            let report = match outcome {
                Ok(Ok(batch)) => {
                    metrics::sources::observations(name, batch.observations.len());
                    metrics::sources::records_skipped(name, batch.skipped);
                    info!(
                        source = name,
                        observations = batch.observations.len(),
                        skipped = batch.skipped,
                        "Source finished"
                    );
                    let report = SourceReport {
                        source: name.to_string(),
                        status: SourceStatus::Ok,
                        observations: batch.observations.len(),
                        skipped: batch.skipped,
                        error: None,
                        duration_secs,
                    };
                    collected.observations.extend(batch.observations);
                    collected.snow.extend(batch.snow);
                    report
                }
                Ok(Err(e)) if e.is_run_fatal() => return Err(e),
                Ok(Err(e)) => {
                    metrics::sources::failure(name);
                    error!(source = name, error = %e, "Source failed");
                    SourceReport {
                        source: name.to_string(),
                        status: SourceStatus::Failed,
                        observations: 0,
                        skipped: 0,
                        error: Some(e.to_string()),
                        duration_secs,
                    }
                }
                Err(_) => {
                    metrics::sources::failure(name);
                    let e = ScraperError::unavailable(
                        name,
                        format!("no result within {}s", self.source_deadline.as_secs()),
                    );
                    error!(source = name, error = %e, "Source timed out");
                    SourceReport {
                        source: name.to_string(),
                        status: SourceStatus::TimedOut,
                        observations: 0,
                        skipped: 0,
                        error: Some(e.to_string()),
                        duration_secs,
                    }
                }
            };
            collected.reports.push(report);
        }

        Ok(collected)
    }

    /// Merge partials and snow reports, then drop implausible values.
    /// Returns the observations and how many values were discarded.
    pub fn prepare(observations: Vec<Observation>, snow: &SnowReport) -> (Vec<Observation>, usize) {
        let mut merged = ObservationMerger::merge_partials(observations);
        ObservationMerger::merge_snow(&mut merged, snow);

        let mut discarded = 0;
        for obs in &mut merged {
            let dropped = obs.discard_implausible();
            for field in &dropped {
                warn!(id = %obs.id, field = %field, "Discarding implausible value");
                metrics::pipeline::value_discarded(field.as_str());
            }
            discarded += dropped.len();
        }
        (merged, discarded)
    }

    /// Upsert each observation under its id. The first store error aborts.
    pub async fn persist(&self, observations: &[Observation]) -> Result<usize> {
        let mut written = 0;
        for obs in observations {
            let document = ObservationDocument::from(obs).to_value()?;
            self.store.upsert(&obs.id, document).await.map_err(|e| match e {
                ScraperError::Persistence(_) => e,
                other => ScraperError::Persistence(format!("{}: {}", obs.id, other)),
            })?;
            metrics::pipeline::document_upserted();
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryDocumentStore;
    use crate::types::{GeoPoint, SnowMeasurement, SourceBatch};
    use async_trait::async_trait;

    struct FixedSource {
        name: &'static str,
        result: fn() -> Result<SourceBatch>,
    }

    #[async_trait]
    impl ObservationSource for FixedSource {
        fn source_name(&self) -> &'static str {
            self.name
        }

        async fn fetch_observations(&self) -> Result<SourceBatch> {
            (self.result)()
        }
    }

    struct SlowSource;

    #[async_trait]
    impl ObservationSource for SlowSource {
        fn source_name(&self) -> &'static str {
            "slow"
        }

        async fn fetch_observations(&self) -> Result<SourceBatch> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(SourceBatch::default())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn upsert(&self, _id: &str, _document: serde_json::Value) -> Result<()> {
            Err(ScraperError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }
    }

    fn skistar_batch() -> Result<SourceBatch> {
        let mut top = Observation::new("skistar-areby-top")
            .with_location(GeoPoint::known(63.41634525563247, 13.06472146254914));
        top.temperature_c = Some(-2.3);
        let mut batch = SourceBatch::new(vec![top]);
        batch.snow.insert(
            "areby".to_string(),
            SnowMeasurement {
                snow_depth_cm: Some(45.0),
                ..Default::default()
            },
        );
        Ok(batch)
    }

    fn smhi_batch() -> Result<SourceBatch> {
        let mut obs = Observation::new("smhi-132170");
        obs.humidity_percent = Some(140.0);
        obs.temperature_c = Some(-3.0);
        Ok(SourceBatch::new(vec![obs]))
    }

    fn unavailable() -> Result<SourceBatch> {
        Err(ScraperError::unavailable("trafikverket", "503"))
    }

    fn source(name: &'static str, result: fn() -> Result<SourceBatch>) -> Box<dyn ObservationSource> {
        Box::new(FixedSource { name, result })
    }

    #[tokio::test]
    async fn test_failed_source_does_not_block_others() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let pipeline = IngestionPipeline::new(
            vec![
                source("smhi", smhi_batch),
                source("trafikverket", unavailable),
                source("skistar", skistar_batch),
            ],
            store.clone(),
            Duration::from_secs(5),
        );

        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.documents_written, 2);
        assert_eq!(summary.failed_sources(), 1);
        assert!(!summary.is_failure());
        assert_eq!(summary.sources[1].status, SourceStatus::Failed);
        assert_eq!(store.ids(), vec!["skistar-areby-top", "smhi-132170"]);

        let areby = store.get("skistar-areby-top").unwrap();
        assert_eq!(areby["properties"]["snowDepth_cm"], serde_json::json!(45.0));
        assert_eq!(areby["properties"]["temperature_c"], serde_json::json!(-2.3));
    }

    #[tokio::test]
    async fn test_implausible_values_are_discarded() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let pipeline = IngestionPipeline::new(vec![source("smhi", smhi_batch)], store.clone(), Duration::from_secs(5));

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.values_discarded, 1);

        let doc = store.get("smhi-132170").unwrap();
        assert!(doc["properties"]["humidity_percent"].is_null());
        assert_eq!(doc["properties"]["temperature_c"], serde_json::json!(-3.0));
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let pipeline = IngestionPipeline::new(
            vec![Box::new(SlowSource), source("skistar", skistar_batch)],
            store.clone(),
            Duration::from_millis(50),
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.sources[0].status, SourceStatus::TimedOut);
        assert_eq!(summary.documents_written, 1);
    }

    #[tokio::test]
    async fn test_store_failure_aborts_run() {
        let pipeline = IngestionPipeline::new(
            vec![source("skistar", skistar_batch)],
            Arc::new(FailingStore),
            Duration::from_secs(5),
        );

        let err = pipeline.run().await.unwrap_err();
        assert!(err.is_run_fatal());
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_a_failed_run() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let pipeline = IngestionPipeline::new(vec![source("trafikverket", unavailable)], store.clone(), Duration::from_secs(5));

        let summary = pipeline.run().await.unwrap();
        assert!(summary.is_failure());
        assert!(store.is_empty());
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunSummary {
            started_at: Utc::now(),
            documents_written: 3,
            values_discarded: 0,
            sources: vec![SourceReport {
                source: "smhi".to_string(),
                status: SourceStatus::TimedOut,
                observations: 0,
                skipped: 0,
                error: Some("smhi unavailable: no result within 120s".to_string()),
                duration_secs: 120.0,
            }],
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["sources"][0]["status"], "timed_out");
    }
}

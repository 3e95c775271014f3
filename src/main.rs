use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use live_weather::apis::create_source;
use live_weather::app::ports::HttpClientPort;
use live_weather::config::Config;
use live_weather::constants::get_supported_sources;
use live_weather::infra::ReqwestHttp;
use live_weather::logging;
use live_weather::observability;
use live_weather::pipeline::{IngestionPipeline, RunSummary};
use live_weather::storage::{
    BlobStore, DocumentStore, FsBlobStore, FsDocumentStore, InMemoryBlobStore, InMemoryDocumentStore,
};
use live_weather::types::ObservationSource;
use live_weather::webcams::{list_webcams, CaptureSummary, WebcamCapture};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "live_weather")]
#[command(about = "Mountain weather observation and webcam ingester")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file; defaults to ./config.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    /// Write Prometheus metrics here after the command finishes
    #[arg(long, global = true)]
    metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IngestArgs {
    /// Sources to run (comma-separated). Available: smhi, trafikverket, skistar
    #[arg(long)]
    sources: Option<String>,
    /// Keep results in memory instead of writing to the data directory
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch observations from every source and upsert them
    Ingest(IngestArgs),
    /// Capture the current frame of every configured webcam
    Webcams {
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the stored webcam snapshots as JSON
    ListWebcams,
    /// Ingest observations, then capture webcams
    Run(IngestArgs),
}

fn document_store(config: &Config, dry_run: bool) -> Arc<dyn DocumentStore> {
    if dry_run {
        Arc::new(InMemoryDocumentStore::new())
    } else {
        Arc::new(FsDocumentStore::new(&config.storage.root, &config.storage.collection))
    }
}

fn blob_store(config: &Config, dry_run: bool) -> Arc<dyn BlobStore> {
    if dry_run {
        Arc::new(InMemoryBlobStore::new())
    } else {
        Arc::new(FsBlobStore::new(&config.storage.root, &config.storage.bucket))
    }
}

fn select_sources(
    names: Option<&str>,
    config: &Config,
    http: Arc<dyn HttpClientPort>,
) -> Result<Vec<Box<dyn ObservationSource>>> {
    let names: Vec<String> = match names {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => get_supported_sources().iter().map(|s| s.to_string()).collect(),
    };

    let mut sources = Vec::new();
    for name in &names {
        if !get_supported_sources().contains(&name.as_str()) {
            bail!("Unknown source: {}", name);
        }
        if let Some(source) = create_source(name, config, http.clone()) {
            sources.push(source);
        }
    }
    if sources.is_empty() {
        bail!("No enabled sources to run");
    }
    Ok(sources)
}

async fn run_ingest(args: &IngestArgs, config: &Config, http: Arc<dyn HttpClientPort>) -> Result<RunSummary> {
    let sources = select_sources(args.sources.as_deref(), config, http)?;
    let pipeline = IngestionPipeline::new(sources, document_store(config, args.dry_run), config.source_deadline());
    info!(sources = ?pipeline.source_names(), dry_run = args.dry_run, "Running ingestion");

    let summary = pipeline.run().await.context("Ingestion run aborted")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary)
}

async fn run_webcams(config: &Config, http: Arc<dyn HttpClientPort>, dry_run: bool) -> Result<CaptureSummary> {
    let webcams = config.webcam_descriptors()?;
    let capture = WebcamCapture::new(http, blob_store(config, dry_run));
    info!(webcams = webcams.len(), dry_run, "Capturing webcams");

    let summary = capture.capture_all(&webcams).await.context("Webcam capture aborted")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary)
}

fn check_ingest(summary: &RunSummary) -> Result<()> {
    if summary.is_failure() {
        bail!("Every source failed");
    }
    if summary.failed_sources() > 0 {
        warn!(failed = summary.failed_sources(), "Some sources failed");
    }
    Ok(())
}

async fn execute(cli: &Cli, config: &Config) -> Result<()> {
    let http: Arc<dyn HttpClientPort> = Arc::new(
        ReqwestHttp::new(config.request_timeout(), config.http.user_agent.as_deref())
            .context("Failed to build HTTP client")?,
    );

    match &cli.command {
        Commands::Ingest(args) => {
            let summary = run_ingest(args, config, http).await?;
            check_ingest(&summary)?;
        }
        Commands::Webcams { dry_run } => {
            run_webcams(config, http, *dry_run).await?;
        }
        Commands::ListWebcams => {
            let store = blob_store(config, false);
            let entries = list_webcams(store.as_ref(), &config.storage.public_base_url()).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Run(args) => {
            let summary = run_ingest(args, config, http.clone()).await?;
            run_webcams(config, http, args.dry_run).await?;
            check_ingest(&summary)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _guard = logging::init_logging(&cli.log_dir).context("Failed to set up logging")?;

    if let Err(e) = observability::init() {
        warn!("Metrics disabled: {}", e);
    }

    let config = Config::load(cli.config.as_deref())?;
    let result = execute(&cli, &config).await;

    if let Some(path) = &cli.metrics_out {
        if let Some(text) = observability::render() {
            std::fs::write(path, text).with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        }
    }

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

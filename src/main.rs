//! CLI entry point for the station crowding pipeline.
//!
//! Provides subcommands for building per-station footfall baselines, polling
//! live crowding into the bounded row store, and rendering the heatmap
//! payloads (optionally uploading them to S3).

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use station_crowding::baseline::{
    FootfallSource, build_baselines, load_footfall_dir, read_baselines, read_stations,
    sync_footfall_files, write_baselines,
};
use station_crowding::config::{
    Config, DEFAULT_CAPACITY, DEFAULT_STATION_INFO_PATH, WORKSHEET_NAME,
};
use station_crowding::fetch::BasicClient;
use station_crowding::fetch::auth::UrlParam;
use station_crowding::infra::tfl::TflCrowdingClient;
use station_crowding::model::FootfallBaseline;
use station_crowding::output::{write_json, write_json_to_s3};
use station_crowding::pipeline::{poll_cycle, render_dashboard};
use station_crowding::poller::{LivePoller, PollPolicy};
use station_crowding::services::crowding_api::CrowdingApi;
use station_crowding::store::{CsvSheet, ObservationLog, RetentionStore};
use tracing::{Instrument, error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "station_crowding")]
#[command(about = "Live station crowding collection and heatmap generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync footfall extracts and compute each station's footfall baseline
    BuildBaseline {
        /// Station info CSV (stop_id, station, lat, lon)
        #[arg(long, default_value = DEFAULT_STATION_INFO_PATH)]
        station_info: PathBuf,

        /// Folder holding the downloaded footfall extracts
        #[arg(short = 'd', long, default_value = "NetworkDemand")]
        download_dir: PathBuf,

        /// Baseline CSV to write
        #[arg(short, long, default_value = "data/stations_baseline_footfall.csv")]
        output: PathBuf,

        /// Use the extracts already in the download folder
        #[arg(long, default_value_t = false)]
        skip_sync: bool,
    },
    /// Poll live crowding for every station and append it to the row store
    Poll {
        /// Number of polling cycles (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 1)]
        samples: usize,

        /// Seconds to wait between cycles
        #[arg(short = 'r', long, default_value_t = 300)]
        interval: u64,

        /// Maximum data rows kept in the store
        #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,
    },
    /// Aggregate the stored observations into heatmap payloads
    Render {
        /// Where to write the hourly/daily/weekly heatmap document
        #[arg(long, default_value = "dashboard/heatmap.json")]
        heatmap_output: PathBuf,

        /// Where to write the latest-snapshot layer
        #[arg(long, default_value = "dashboard/latest.json")]
        latest_output: PathBuf,

        /// Optional: S3 bucket to upload both payloads to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: Gzip compress payloads before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildBaseline {
            station_info,
            download_dir,
            output,
            skip_sync,
        } => {
            build_baseline(&station_info, &download_dir, &output, skip_sync).await?;
        }
        Commands::Poll {
            samples,
            interval,
            capacity,
        } => {
            let config = Config::from_env()?;
            poll(&config, samples, interval, capacity).await?;
        }
        Commands::Render {
            heatmap_output,
            latest_output,
            s3_bucket,
            gzip,
        } => {
            let config = Config::from_env()?;
            render(&config, &heatmap_output, &latest_output, s3_bucket, gzip).await?;
        }
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/station_crowding.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("station_crowding.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info"));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    file_guard
}

fn env_filter(var: &str, default: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

fn open_sheet(config: &Config) -> Result<CsvSheet> {
    CsvSheet::open_sheet(
        &config.sheet_dir,
        &config.sheet_id,
        WORKSHEET_NAME,
        &config.credentials_path,
    )
}

/// Optionally refreshes the local footfall extracts, then derives and saves
/// per-station baselines.
#[tracing::instrument(skip_all, fields(output = %output.display()))]
async fn build_baseline(
    station_info: &Path,
    download_dir: &Path,
    output: &Path,
    skip_sync: bool,
) -> Result<()> {
    let stations = read_stations(station_info)?;
    if stations.is_empty() {
        anyhow::bail!("station info '{}' has no stations", station_info.display());
    }

    if skip_sync {
        info!("Skipping footfall sync");
    } else {
        let client = BasicClient::new(REQUEST_TIMEOUT)?;
        sync_footfall_files(&client, &FootfallSource::default(), download_dir).await?;
    }

    let footfall = load_footfall_dir(download_dir)?;
    let baselines = build_baselines(&stations, &footfall);
    write_baselines(output, &baselines)?;
    Ok(())
}

/// Runs polling cycles at a fixed interval. A failed cycle is logged and the
/// next one still runs.
#[tracing::instrument(skip(config))]
async fn poll(config: &Config, samples: usize, interval: u64, capacity: usize) -> Result<()> {
    let baselines = read_baselines(&config.baseline_path)?;

    let http = UrlParam::app_key(BasicClient::new(REQUEST_TIMEOUT)?, config.api_key.clone());
    let api = TflCrowdingClient::new(http, config.crowding_url_template.clone());
    let poller = LivePoller::new(api, PollPolicy::default());

    if samples == 0 {
        info!(interval, "Polling infinitely. Press Ctrl+C to stop.");
    } else {
        info!(samples, interval, "Starting polling");
    }

    let mut cycle = 0;
    loop {
        if samples > 0 && cycle >= samples {
            break;
        }
        cycle += 1;

        run_cycle(config, &poller, &baselines, capacity)
            .instrument(tracing::info_span!("poll_cycle", cycle))
            .await;

        if samples == 0 || cycle < samples {
            info!(interval, "Waiting before next cycle");
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }

    info!(cycles = cycle, "Finished polling");
    Ok(())
}

/// One cycle against a freshly opened store. Failures are logged only.
async fn run_cycle<A: CrowdingApi>(
    config: &Config,
    poller: &LivePoller<A>,
    baselines: &[FootfallBaseline],
    capacity: usize,
) {
    let sheet = match open_sheet(config) {
        Ok(sheet) => sheet,
        Err(e) => {
            error!(error = format!("{e:#}"), "Row store unavailable, skipping cycle");
            return;
        }
    };

    let mut store = RetentionStore::new(sheet, capacity);
    match poll_cycle(poller, &mut store, baselines).await {
        Ok(summary) => info!(
            observed = summary.poll.observed_count(),
            evicted = summary.append.map_or(0, |a| a.evicted),
            "Cycle complete"
        ),
        Err(e) => error!(error = %e, "Saving observations failed"),
    }
}

/// Builds the heatmap document and latest snapshot from the whole store and
/// writes them locally, uploading to S3 when a bucket is given.
#[tracing::instrument(skip(config, s3_bucket))]
async fn render(
    config: &Config,
    heatmap_output: &Path,
    latest_output: &Path,
    s3_bucket: Option<String>,
    gzip: bool,
) -> Result<()> {
    let stations = read_stations(&config.station_info_path)?;
    let baselines = read_baselines(&config.baseline_path)?;
    let observations = open_sheet(config)?
        .read_all()
        .context("cannot read observations from row store")?;

    let dashboard = render_dashboard(&observations, &stations, &baselines);
    write_json(heatmap_output, &dashboard.heatmap)?;
    write_json(latest_output, &dashboard.latest)?;
    info!(
        hourly = dashboard.heatmap.hourly.len(),
        daily = dashboard.heatmap.daily.len(),
        weekly = dashboard.heatmap.weekly.len(),
        latest = dashboard.latest.len(),
        "Dashboard payloads written"
    );

    if let Some(bucket) = s3_bucket {
        let aws = aws_config::load_from_env().await;
        let s3 = aws_sdk_s3::Client::new(&aws);
        write_json_to_s3(&s3, &bucket, "dashboard/heatmap.json", &dashboard.heatmap, gzip).await?;
        write_json_to_s3(&s3, &bucket, "dashboard/latest.json", &dashboard.latest, gzip).await?;
    }

    Ok(())
}

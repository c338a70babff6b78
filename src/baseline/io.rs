//! CSV persistence for station info and baselines.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::info;

use crate::model::{FootfallBaseline, Station};

#[derive(Debug, Deserialize)]
struct StationRow {
    stop_id: String,
    station: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    lat: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BaselineRow {
    stop_id: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    footfall_baseline: Option<f64>,
}

fn open_reader(path: &Path, what: &str) -> Result<csv::Reader<fs::File>> {
    if !path.exists() {
        bail!("{what} file not found at '{}'", path.display());
    }
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("cannot open {what} file '{}'", path.display()))
}

/// Loads station info (`stop_id, station, lat, lon`). Unparseable coordinates
/// become NaN so the station is kept but never plotted.
pub fn read_stations(path: &Path) -> Result<Vec<Station>> {
    let mut rdr = open_reader(path, "station info")?;
    let mut stations = Vec::new();
    for result in rdr.deserialize() {
        let row: StationRow =
            result.with_context(|| format!("invalid station info in '{}'", path.display()))?;
        stations.push(Station {
            stop_id: row.stop_id,
            name: row.station,
            lat: row.lat.unwrap_or(f64::NAN),
            lon: row.lon.unwrap_or(f64::NAN),
        });
    }
    info!(path = %path.display(), stations = stations.len(), "Station info loaded");
    Ok(stations)
}

/// Loads baselines (`stop_id, footfall_baseline`); an empty or invalid
/// baseline cell reads as unknown. Other columns are ignored.
pub fn read_baselines(path: &Path) -> Result<Vec<FootfallBaseline>> {
    let mut rdr = open_reader(path, "baseline")?;
    let mut baselines = Vec::new();
    for result in rdr.deserialize() {
        let row: BaselineRow =
            result.with_context(|| format!("invalid baseline row in '{}'", path.display()))?;
        baselines.push(FootfallBaseline {
            stop_id: row.stop_id,
            footfall_baseline: row.footfall_baseline,
        });
    }
    if baselines.is_empty() {
        bail!("baseline file '{}' has no stations", path.display());
    }
    info!(path = %path.display(), stations = baselines.len(), "Baselines loaded");
    Ok(baselines)
}

pub fn write_baselines(path: &Path, baselines: &[FootfallBaseline]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("cannot create baseline file '{}'", path.display()))?;
    for baseline in baselines {
        writer.serialize(baseline)?;
    }
    writer.flush()?;
    info!(path = %path.display(), stations = baselines.len(), "Baselines saved");
    Ok(())
}

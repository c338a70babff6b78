use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info, warn};

use super::{ObservationLog, StoreError};
use crate::config::ServiceAccount;
use crate::model::{LiveObservation, TIMESTAMP_FORMAT, parse_timestamp};

/// Column order of the persisted sheet.
pub const HEADER: [&str; 3] = ["stop_id", "timestamp", "live_footfall"];

/// A worksheet kept as a CSV file with a single header row.
///
/// Trimming rewrites the file into a sibling temp file and renames it over
/// the sheet file, so a failed eviction leaves the previous rows intact.
pub struct CsvSheet {
    path: PathBuf,
}

impl CsvSheet {
    /// Opens (creating if needed) the worksheet file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::Retrieval(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        Ok(Self { path })
    }

    /// Opens worksheet `worksheet` of sheet `sheet_id` under `root`, acting
    /// as the service account described by `credentials`.
    pub fn open_sheet(
        root: &Path,
        sheet_id: &str,
        worksheet: &str,
        credentials: &Path,
    ) -> anyhow::Result<Self> {
        let account = ServiceAccount::load(credentials)?;
        let path = root.join(sheet_id).join(format!("{worksheet}.csv"));
        let sheet = Self::open(&path)?;
        info!(
            sheet_id,
            worksheet,
            account = %account.client_email,
            path = %path.display(),
            "Opened row store"
        );
        Ok(sheet)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn has_content(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }

    fn records(&self) -> Result<Vec<csv::StringRecord>, StoreError> {
        if !self.has_content() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .map_err(|e| StoreError::Retrieval(format!("{}: {e}", self.path.display())))?;
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

        rdr.records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Retrieval(e.to_string()))
    }
}

/// NaN cannot be represented in the sheet; it is stored as zero.
fn storable(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value }
}

fn evict_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Evict(e.to_string())
}

fn append_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Append(e.to_string())
}

/// Rewrites `target` as the header plus `rows`, going through a sibling temp
/// file. The temp file is removed again if anything after creating it fails.
fn replace_rows(target: &Path, rows: &[csv::StringRecord]) -> Result<(), StoreError> {
    let tmp_path = target.with_extension("csv.tmp");
    let file = File::create(&tmp_path).map_err(evict_err)?;

    let written =
        write_rows(file, rows).and_then(|()| fs::rename(&tmp_path, target).map_err(evict_err));
    if written.is_err() {
        if let Err(e) = fs::remove_file(&tmp_path) {
            warn!(path = %tmp_path.display(), error = %e, "Could not remove temp sheet");
        }
    }
    written
}

fn write_rows(file: File, rows: &[csv::StringRecord]) -> Result<(), StoreError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(HEADER).map_err(evict_err)?;
    for record in rows {
        writer.write_record(record).map_err(evict_err)?;
    }
    writer.flush().map_err(evict_err)
}

fn parse_record(index: usize, record: &csv::StringRecord) -> Result<LiveObservation, StoreError> {
    // Row numbers are 1-based with the header as row 1.
    let row = index + 2;
    let field = |i: usize| {
        record.get(i).ok_or_else(|| StoreError::Malformed {
            row,
            reason: format!("missing column '{}'", HEADER[i]),
        })
    };

    let stop_id = field(0)?.to_string();
    let raw_timestamp = field(1)?;
    let timestamp = parse_timestamp(raw_timestamp).ok_or_else(|| StoreError::Malformed {
        row,
        reason: format!("unparseable timestamp '{raw_timestamp}'"),
    })?;
    let raw_footfall = field(2)?.trim();
    let live_footfall = if raw_footfall.is_empty() {
        0.0
    } else {
        raw_footfall.parse::<f64>().map_err(|e| StoreError::Malformed {
            row,
            reason: format!("live_footfall '{raw_footfall}': {e}"),
        })?
    };

    Ok(LiveObservation {
        stop_id,
        timestamp,
        live_footfall,
    })
}

impl ObservationLog for CsvSheet {
    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records()?.len())
    }

    fn evict_oldest(&mut self, n: usize) -> Result<(), StoreError> {
        let records = self.records()?;
        let keep = &records[n.min(records.len())..];

        replace_rows(&self.path, keep)?;
        debug!(evicted = records.len() - keep.len(), kept = keep.len(), "Sheet trimmed");
        Ok(())
    }

    fn append(&mut self, rows: &[LiveObservation]) -> Result<(), StoreError> {
        let needs_header = !self.has_content();
        debug!(path = %self.path.display(), needs_header, "Appending sheet rows");

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(append_err)?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(HEADER).map_err(append_err)?;
        }
        for row in rows {
            writer
                .write_record([
                    row.stop_id.clone(),
                    row.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    storable(row.live_footfall).to_string(),
                ])
                .map_err(append_err)?;
        }
        writer.flush().map_err(append_err)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LiveObservation>, StoreError> {
        self.records()?
            .iter()
            .enumerate()
            .map(|(i, record)| parse_record(i, record))
            .collect()
    }
}

//! Reading the published daily station footfall extracts.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// One row of a footfall extract, read positionally; the file's own header
/// names vary between years and are ignored.
#[derive(Debug, Deserialize)]
struct RawFootfallRow {
    date: String,
    #[allow(dead_code)]
    weekday: String,
    station: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    entries: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    exits: Option<f64>,
}

/// Daily entries plus exits at one station.
#[derive(Debug, Clone, PartialEq)]
pub struct FootfallRecord {
    pub date: NaiveDate,
    pub station: String,
    pub total_count: f64,
}

impl RawFootfallRow {
    /// `None` when either count is blank or not a number.
    fn into_record(self) -> Result<Option<FootfallRecord>> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y%m%d")
            .with_context(|| format!("invalid date '{}'", self.date))?;
        let (Some(entries), Some(exits)) = (self.entries, self.exits) else {
            return Ok(None);
        };
        Ok(Some(FootfallRecord {
            date,
            station: self.station,
            total_count: entries + exits,
        }))
    }
}

/// Parses one footfall extract.
///
/// Rows with a missing or non-numeric count are logged and left out; a bad
/// date or a short row fails the whole extract.
pub fn read_footfall<R: Read>(reader: R) -> Result<Vec<FootfallRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = i + 2;
        let raw: RawFootfallRow = result?
            .deserialize(None)
            .with_context(|| format!("row {row}"))?;
        let station = raw.station.clone();
        match raw.into_record().with_context(|| format!("row {row}"))? {
            Some(record) => records.push(record),
            None => warn!(row, station = %station, "Footfall row has no usable counts, skipped"),
        }
    }
    Ok(records)
}

/// Reads every extract in `folder` in file-name order (which is year order).
/// Files that cannot be read or parsed are logged and skipped.
#[tracing::instrument(skip_all, fields(folder = %folder.display()))]
pub fn load_footfall_dir(folder: &Path) -> Result<Vec<FootfallRecord>> {
    let mut paths: Vec<_> = fs::read_dir(folder)
        .with_context(|| format!("cannot read footfall folder {}", folder.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut all = Vec::new();
    for path in paths {
        let loaded = File::open(&path)
            .map_err(anyhow::Error::from)
            .and_then(read_footfall);
        match loaded {
            Ok(records) => {
                debug!(file = %path.display(), rows = records.len(), "Footfall extract loaded");
                all.extend(records);
            }
            Err(e) => {
                warn!(file = %path.display(), error = format!("{e:#}"), "Skipping unreadable footfall extract");
            }
        }
    }

    info!(rows = all.len(), "Footfall extracts loaded");
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    const EXTRACT: &str = "TravelDate,DayOfWeek,Station,EntryTapCount,ExitTapCount
20240101,Monday,Baker Street,1000,1200
20240102,Tuesday,Edgware Road B,300,250
";

    #[test]
    fn test_read_footfall_sums_entries_and_exits() {
        let records = read_footfall(EXTRACT.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].station, "Baker Street");
        assert_eq!(records[0].total_count, 2200.0);
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_read_footfall_rejects_bad_date() {
        let bad = "a,b,c,d,e\n2024-01-01,Monday,Bank,1,2\n";
        assert!(read_footfall(bad.as_bytes()).is_err());
    }

    #[test]
    fn test_read_footfall_skips_rows_without_counts() {
        let extract = "TravelDate,DayOfWeek,Station,EntryTapCount,ExitTapCount
20240101,Monday,Baker Street,1000,1200
20240101,Monday,Bank,,250
20240101,Monday,Oval,12,n/a
20240102,Tuesday,Baker Street,5000,5000
";
        let records = read_footfall(extract.as_bytes()).unwrap();

        let totals: Vec<_> = records
            .iter()
            .map(|r| (r.station.as_str(), r.total_count))
            .collect();
        assert_eq!(totals, vec![("Baker Street", 2200.0), ("Baker Street", 10000.0)]);
    }

    #[test]
    fn test_load_dir_keeps_extract_with_blank_count() {
        let folder = env::temp_dir().join("station_crowding_test_footfall_blank_cell");
        let _ = fs::remove_dir_all(&folder);
        fs::create_dir_all(&folder).unwrap();
        fs::write(
            folder.join("StationFootfall_2024.csv"),
            "a,b,c,d,e\n20240101,Monday,Baker Street,1000,1200\n20240101,Monday,Bank,,250\n20240102,Tuesday,Baker Street,5000,5000\n",
        )
        .unwrap();

        let records = load_footfall_dir(&folder).unwrap();
        assert_eq!(records.len(), 2);

        fs::remove_dir_all(&folder).unwrap();
    }

    #[test]
    fn test_load_dir_skips_bad_files() {
        let folder = env::temp_dir().join("station_crowding_test_footfall_dir");
        let _ = fs::remove_dir_all(&folder);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("StationFootfall_2024.csv"), EXTRACT).unwrap();
        fs::write(folder.join("StationFootfall_2025.csv"), "x,y\nnot,numbers\n").unwrap();

        let records = load_footfall_dir(&folder).unwrap();
        assert_eq!(records.len(), 2);

        fs::remove_dir_all(&folder).unwrap();
    }
}

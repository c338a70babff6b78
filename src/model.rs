//! Core records shared by the baseline, polling, storage and aggregation stages.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Text format used when persisting observation timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Static reference data for one station, as found in the station info file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub stop_id: String,
    #[serde(rename = "station")]
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Historical maximum daily footfall for a station.
///
/// `footfall_baseline` is `None` when no footfall extract could be matched to
/// the station; such stations cannot be polled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootfallBaseline {
    pub stop_id: String,
    pub footfall_baseline: Option<f64>,
}

/// One live footfall estimate for a station, created once per polling cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveObservation {
    pub stop_id: String,
    pub timestamp: NaiveDateTime,
    pub live_footfall: f64,
}

impl LiveObservation {
    pub fn new(stop_id: impl Into<String>, timestamp: NaiveDateTime, live_footfall: f64) -> Self {
        Self {
            stop_id: stop_id.into(),
            timestamp,
            live_footfall,
        }
    }
}

/// Largest known baseline across all stations, or `0.0` when none is known.
pub fn max_baseline(baselines: &[FootfallBaseline]) -> f64 {
    baselines
        .iter()
        .filter_map(|b| b.footfall_baseline)
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max)
}

/// Parses a persisted timestamp.
///
/// Accepts the store's own format (with or without fractional seconds), a
/// `T` separated variant, and RFC 3339 (converted to its local wall-clock part).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.naive_local())
}

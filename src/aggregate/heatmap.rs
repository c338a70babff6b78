use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::bucket::Resolution;
use super::types::{BucketSeries, HeatmapDocument, HeatmapPoint};
use super::utility::{finite_or_zero, mean};
use crate::model::{LiveObservation, Station};

/// Observations for one station within one bucket.
struct Group<'a> {
    stop_id: &'a str,
    values: Vec<f64>,
}

/// Normalizes a footfall figure against the largest station baseline, on a
/// 0-100 scale. Zero when the baseline is not positive, the result is not
/// finite, or the footfall is negative.
pub fn crowding_metric(live_footfall: f64, max_baseline: f64) -> f64 {
    if max_baseline > 0.0 {
        finite_or_zero(live_footfall / max_baseline * 100.0).max(0.0)
    } else {
        0.0
    }
}

/// Stations keyed by `stop_id`, skipping any without usable coordinates.
/// The first row wins when a `stop_id` repeats.
fn station_index(stations: &[Station]) -> HashMap<&str, &Station> {
    let mut index = HashMap::with_capacity(stations.len());
    for station in stations {
        if !(station.lat.is_finite() && station.lon.is_finite()) {
            debug!(stop_id = %station.stop_id, "Station has no usable coordinates");
            continue;
        }
        index.entry(station.stop_id.as_str()).or_insert(station);
    }
    index
}

fn point(station: &Station, crowding_metric: f64) -> HeatmapPoint {
    HeatmapPoint {
        lat: station.lat,
        lon: station.lon,
        crowding_metric,
        station_name: station.name.clone(),
    }
}

/// Groups observations into `resolution` buckets and computes the mean
/// crowding metric per (bucket, station).
///
/// Buckets come out in chronological order. Within a bucket, stations appear
/// in the order they were first observed, so identical input always yields
/// identical output. Observations for unknown stations are dropped and logged.
#[tracing::instrument(skip_all, fields(resolution = %resolution, observations = observations.len()))]
pub fn aggregate(
    observations: &[LiveObservation],
    stations: &[Station],
    max_baseline: f64,
    resolution: Resolution,
) -> BucketSeries {
    let mut groups: BTreeMap<NaiveDateTime, Vec<Group>> = BTreeMap::new();
    let mut slots: HashMap<(NaiveDateTime, &str), usize> = HashMap::new();

    for obs in observations {
        let start = resolution.bucket_start(obs.timestamp);
        let bucket = groups.entry(start).or_default();
        let slot = *slots.entry((start, obs.stop_id.as_str())).or_insert_with(|| {
            bucket.push(Group {
                stop_id: &obs.stop_id,
                values: Vec::new(),
            });
            bucket.len() - 1
        });
        if !obs.live_footfall.is_nan() {
            bucket[slot].values.push(obs.live_footfall);
        }
    }

    let index = station_index(stations);
    let mut unknown: HashSet<&str> = HashSet::new();
    let mut series = BucketSeries::default();

    for (start, bucket) in groups {
        let points: Vec<HeatmapPoint> = bucket
            .into_iter()
            .filter_map(|group| match index.get(group.stop_id) {
                Some(station) => {
                    let metric = crowding_metric(mean(&group.values), max_baseline);
                    Some(point(station, metric))
                }
                None => {
                    unknown.insert(group.stop_id);
                    None
                }
            })
            .collect();

        if !points.is_empty() {
            series.buckets.insert(start, points);
        }
    }

    if !unknown.is_empty() {
        let mut ids: Vec<_> = unknown.into_iter().collect();
        ids.sort_unstable();
        warn!(count = ids.len(), stop_ids = ?ids, "Observations for unknown stations dropped");
    }
    debug!(buckets = series.len(), "Aggregation finished");
    series
}

/// Runs [`aggregate`] for every resolution.
pub fn aggregate_all(
    observations: &[LiveObservation],
    stations: &[Station],
    max_baseline: f64,
) -> HeatmapDocument {
    HeatmapDocument {
        hourly: aggregate(observations, stations, max_baseline, Resolution::Hourly),
        daily: aggregate(observations, stations, max_baseline, Resolution::Daily),
        weekly: aggregate(observations, stations, max_baseline, Resolution::Weekly),
    }
}

/// The current heatmap layer: one point per station with usable coordinates,
/// in station order, built from that station's most recent observation.
///
/// Stations with no observation are shown at zero intensity. When two
/// observations share the latest timestamp the one stored later wins.
pub fn latest_snapshot(
    observations: &[LiveObservation],
    stations: &[Station],
    max_baseline: f64,
) -> Vec<HeatmapPoint> {
    let mut latest: HashMap<&str, &LiveObservation> = HashMap::new();
    for obs in observations {
        latest
            .entry(obs.stop_id.as_str())
            .and_modify(|current| {
                if obs.timestamp >= current.timestamp {
                    *current = obs;
                }
            })
            .or_insert(obs);
    }

    let mut seen = HashSet::new();
    stations
        .iter()
        .filter(|s| s.lat.is_finite() && s.lon.is_finite())
        .filter(|s| seen.insert(s.stop_id.as_str()))
        .map(|station| {
            let metric = latest
                .get(station.stop_id.as_str())
                .map_or(0.0, |obs| crowding_metric(obs.live_footfall, max_baseline));
            point(station, metric)
        })
        .collect()
}

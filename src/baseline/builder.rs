use std::collections::HashMap;

use tracing::{info, warn};

use super::footfall::FootfallRecord;
use crate::model::{FootfallBaseline, Station};
use crate::normalize::normalize_name;

/// Station info rows with no footfall counterpart at all.
static EXCLUDED_STATIONS: &[&str] = &["Paddington (H&C Line)-Underground"];

/// Maximum `total_count` per normalized station name.
pub fn max_footfall_by_name(footfall: &[FootfallRecord]) -> HashMap<String, f64> {
    let mut maxima: HashMap<String, f64> = HashMap::new();
    for record in footfall {
        if record.total_count.is_nan() {
            continue;
        }
        maxima
            .entry(normalize_name(&record.station))
            .and_modify(|max| *max = max.max(record.total_count))
            .or_insert(record.total_count);
    }
    maxima
}

/// Joins the per-name footfall maxima onto the station info rows.
///
/// Every station row (except the excluded ones) yields one baseline, in
/// station order; stations whose normalized name has no footfall keep an
/// unknown baseline.
#[tracing::instrument(skip_all, fields(stations = stations.len(), footfall_rows = footfall.len()))]
pub fn build_baselines(stations: &[Station], footfall: &[FootfallRecord]) -> Vec<FootfallBaseline> {
    let maxima = max_footfall_by_name(footfall);

    let baselines: Vec<_> = stations
        .iter()
        .filter(|s| !EXCLUDED_STATIONS.contains(&s.name.as_str()))
        .map(|station| {
            let footfall_baseline = maxima.get(&normalize_name(&station.name)).copied();
            if footfall_baseline.is_none() {
                warn!(stop_id = %station.stop_id, station = %station.name, "No footfall data matched station");
            }
            FootfallBaseline {
                stop_id: station.stop_id.clone(),
                footfall_baseline,
            }
        })
        .collect();

    let matched = baselines
        .iter()
        .filter(|b| b.footfall_baseline.is_some())
        .count();
    info!(matched, unmatched = baselines.len() - matched, "Baselines built");
    baselines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn station(stop_id: &str, name: &str) -> Station {
        Station {
            stop_id: stop_id.into(),
            name: name.into(),
            lat: 51.5,
            lon: -0.1,
        }
    }

    fn record(station: &str, day: u32, total_count: f64) -> FootfallRecord {
        FootfallRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            station: station.into(),
            total_count,
        }
    }

    #[test]
    fn test_baseline_is_max_over_days() {
        let stations = vec![station("940GZZLUBST", "Baker Street")];
        let footfall = vec![
            record("Baker Street", 1, 5000.0),
            record("Baker Street", 2, 9000.0),
            record("BAKER STREET", 3, 7000.0),
        ];

        let baselines = build_baselines(&stations, &footfall);
        assert_eq!(
            baselines,
            vec![FootfallBaseline {
                stop_id: "940GZZLUBST".into(),
                footfall_baseline: Some(9000.0),
            }]
        );
    }

    #[test]
    fn test_aliases_join_renamed_stations() {
        let stations = vec![
            station("940GZZLUERB", "Edgware Road (Bakerloo)"),
            station("940GZZLUSBC", "Shepherd's Bush (Central)"),
        ];
        let footfall = vec![record("Edgware Road B", 1, 10.0), record("Shepherds Bush", 1, 20.0)];

        let values: Vec<_> = build_baselines(&stations, &footfall)
            .into_iter()
            .map(|b| b.footfall_baseline)
            .collect();
        assert_eq!(values, vec![Some(10.0), Some(20.0)]);
    }

    #[test]
    fn test_unmatched_and_excluded_stations() {
        let stations = vec![
            station("A", "Nowhere Junction"),
            station("B", "Paddington (H&C Line)-Underground"),
        ];
        let baselines = build_baselines(&stations, &[record("Bank", 1, 1.0)]);

        assert_eq!(baselines.len(), 1);
        assert_eq!(baselines[0].stop_id, "A");
        assert_eq!(baselines[0].footfall_baseline, None);
    }
}

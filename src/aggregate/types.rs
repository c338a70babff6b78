//! Data types produced by the aggregation pipeline.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, SerializeTuple};
use serde::{Serialize, Serializer};

use super::bucket::{BUCKET_KEY_FORMAT, Resolution};

/// One heatmap sample. Serialized as `[lat, lon, crowding_metric, station_name]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapPoint {
    pub lat: f64,
    pub lon: f64,
    pub crowding_metric: f64,
    pub station_name: String,
}

impl Serialize for HeatmapPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.lat)?;
        tuple.serialize_element(&self.lon)?;
        tuple.serialize_element(&self.crowding_metric)?;
        tuple.serialize_element(&self.station_name)?;
        tuple.end()
    }
}

/// Heatmap points per bucket for one resolution, in chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketSeries {
    pub buckets: BTreeMap<NaiveDateTime, Vec<HeatmapPoint>>,
}

impl BucketSeries {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn get(&self, bucket_start: &NaiveDateTime) -> Option<&[HeatmapPoint]> {
        self.buckets.get(bucket_start).map(Vec::as_slice)
    }

    /// Bucket start rendered the way it appears as a document key.
    pub fn bucket_key(bucket_start: &NaiveDateTime) -> String {
        bucket_start.format(BUCKET_KEY_FORMAT).to_string()
    }
}

impl Serialize for BucketSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (start, points) in &self.buckets {
            map.serialize_entry(&Self::bucket_key(start), points)?;
        }
        map.end()
    }
}

/// The heatmap artifact: one bucket series per resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeatmapDocument {
    pub hourly: BucketSeries,
    pub daily: BucketSeries,
    pub weekly: BucketSeries,
}

impl HeatmapDocument {
    pub fn series(&self, resolution: Resolution) -> &BucketSeries {
        match resolution {
            Resolution::Hourly => &self.hourly,
            Resolution::Daily => &self.daily,
            Resolution::Weekly => &self.weekly,
        }
    }
}

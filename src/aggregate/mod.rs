//! Time-bucketed crowding aggregation.
//!
//! Observations are grouped per station into hourly, daily or weekly buckets,
//! averaged, and normalized against the largest station baseline to give the
//! heatmap intensity for every (bucket, station) pair.

pub mod bucket;
pub mod heatmap;
pub mod types;
pub mod utility;

pub use bucket::Resolution;
pub use heatmap::{aggregate, aggregate_all, crowding_metric, latest_snapshot};
pub use types::{BucketSeries, HeatmapDocument, HeatmapPoint};

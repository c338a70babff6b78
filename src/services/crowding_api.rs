//! Trait and types for interacting with a live station crowding provider.

use anyhow::Result;
use serde::Deserialize;

/// Live crowding reading for a single station.
///
/// `percentage_of_baseline` is a ratio of current to typical footfall
/// (`0.5` = half of the baseline); providers omit it when they have no
/// estimate for the station.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LiveCrowding {
    #[serde(rename = "percentageOfBaseline", default)]
    pub percentage_of_baseline: Option<f64>,
}

/// Abstraction over a live crowding provider (e.g., the TfL crowding API).
///
/// One call is one request attempt; retrying is the caller's concern.
#[async_trait::async_trait]
pub trait CrowdingApi {
    async fn live_crowding(&self, stop_id: &str) -> Result<LiveCrowding>;
}

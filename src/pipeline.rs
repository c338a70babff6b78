//! The stages glued together: one polling cycle into the store, and one
//! rendering pass out of it.

use tracing::{info, warn};

use crate::aggregate::{HeatmapDocument, HeatmapPoint, aggregate_all, latest_snapshot};
use crate::model::{FootfallBaseline, LiveObservation, Station, max_baseline};
use crate::poller::{LivePoller, PollReport};
use crate::services::crowding_api::CrowdingApi;
use crate::store::{AppendReport, ObservationLog, RetentionStore, StoreError};

/// Outcome of one polling cycle.
#[derive(Debug)]
pub struct CycleSummary {
    pub poll: PollReport,
    /// `None` when nothing was observed and the store was left untouched.
    pub append: Option<AppendReport>,
}

/// Polls every station once and appends the observations to the store.
///
/// Store errors are returned for the caller to log; the cycle is not retried.
pub async fn poll_cycle<A, L>(
    poller: &LivePoller<A>,
    store: &mut RetentionStore<L>,
    baselines: &[FootfallBaseline],
) -> Result<CycleSummary, StoreError>
where
    A: CrowdingApi,
    L: ObservationLog,
{
    let poll = poller.poll(baselines).await;
    for (stop_id, reason) in poll.skipped() {
        info!(stop_id, reason = %reason, "No observation this cycle");
    }

    let observations = poll.observations();
    if observations.is_empty() {
        warn!("No live crowding data fetched, skipping store append");
        return Ok(CycleSummary { poll, append: None });
    }

    let append = store.append(&observations)?;
    Ok(CycleSummary {
        poll,
        append: Some(append),
    })
}

/// Both dashboard payloads, built from the same store snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub heatmap: HeatmapDocument,
    pub latest: Vec<HeatmapPoint>,
    pub max_baseline: f64,
}

pub fn render_dashboard(
    observations: &[LiveObservation],
    stations: &[Station],
    baselines: &[FootfallBaseline],
) -> Dashboard {
    let max_baseline = max_baseline(baselines);
    info!(
        max_baseline,
        observations = observations.len(),
        "Building dashboard payloads"
    );

    Dashboard {
        heatmap: aggregate_all(observations, stations, max_baseline),
        latest: latest_snapshot(observations, stations, max_baseline),
        max_baseline,
    }
}

//! Sequential live polling of every station with a known baseline.

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{FootfallBaseline, LiveObservation};
use crate::services::crowding_api::CrowdingApi;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(100);

/// Retry and throttling knobs for a polling cycle.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Attempts per station, including the first.
    pub max_attempts: u32,
    /// Pause between failed attempts for the same station.
    pub retry_delay: Duration,
    /// Pause after every station that was requested, successful or not.
    pub request_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }
}

/// Why a station produced no observation this cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("no footfall baseline known")]
    UnknownBaseline,
    #[error("response has no percentageOfBaseline")]
    MissingPercentage,
    #[error("live footfall is not finite (baseline {baseline}, percentage {percentage})")]
    NonFinite { baseline: f64, percentage: f64 },
    #[error("request failed after {attempts} attempts: {message}")]
    RequestFailed { attempts: u32, message: String },
}

/// Result of polling one station.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Observed(LiveObservation),
    Skipped { stop_id: String, reason: SkipReason },
}

/// Outcomes of one polling cycle, in input station order.
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    pub outcomes: Vec<PollOutcome>,
}

impl PollReport {
    pub fn observations(&self) -> Vec<LiveObservation> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                PollOutcome::Observed(obs) => Some(obs.clone()),
                PollOutcome::Skipped { .. } => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            PollOutcome::Skipped { stop_id, reason } => Some((stop_id.as_str(), reason)),
            PollOutcome::Observed(_) => None,
        })
    }

    pub fn observed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PollOutcome::Observed(_)))
            .count()
    }
}

pub struct LivePoller<A> {
    api: A,
    policy: PollPolicy,
}

impl<A: CrowdingApi> LivePoller<A> {
    pub fn new(api: A, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// Polls every station once, stamping all observations with the time the
    /// cycle finished.
    #[tracing::instrument(skip_all, fields(stations = stations.len()))]
    pub async fn poll(&self, stations: &[FootfallBaseline]) -> PollReport {
        let mut pending = Vec::with_capacity(stations.len());

        for station in stations {
            let result = match station.footfall_baseline {
                None => Err(SkipReason::UnknownBaseline),
                Some(baseline) => {
                    let result = self.poll_station(&station.stop_id, baseline).await;
                    tokio::time::sleep(self.policy.request_delay).await;
                    result
                }
            };
            pending.push((station.stop_id.clone(), result));
        }

        let report = stamp(pending, Local::now().naive_local());
        info!(
            observed = report.observed_count(),
            skipped = report.outcomes.len() - report.observed_count(),
            "Polling cycle finished"
        );
        report
    }

    #[tracing::instrument(skip(self), fields(stop_id = %stop_id))]
    async fn poll_station(&self, stop_id: &str, baseline: f64) -> Result<f64, SkipReason> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        let live = loop {
            attempt += 1;
            match self.api.live_crowding(stop_id).await {
                Ok(live) => break live,
                Err(e) if attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %e, "Live crowding request failed, retrying");
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Live crowding request failed, skipping station");
                    return Err(SkipReason::RequestFailed {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
            }
        };

        let percentage = live
            .percentage_of_baseline
            .ok_or(SkipReason::MissingPercentage)?;
        let live_footfall = live_footfall(baseline, percentage)?;
        debug!(percentage, live_footfall, "Live crowding received");
        Ok(live_footfall)
    }
}

/// `baseline * percentage`, unclamped; both inputs and the product must be finite.
pub fn live_footfall(baseline: f64, percentage: f64) -> Result<f64, SkipReason> {
    let value = baseline * percentage;
    if baseline.is_finite() && percentage.is_finite() && value.is_finite() {
        Ok(value)
    } else {
        Err(SkipReason::NonFinite {
            baseline,
            percentage,
        })
    }
}

fn stamp(pending: Vec<(String, Result<f64, SkipReason>)>, timestamp: NaiveDateTime) -> PollReport {
    let outcomes = pending
        .into_iter()
        .map(|(stop_id, result)| match result {
            Ok(live_footfall) => {
                PollOutcome::Observed(LiveObservation::new(stop_id, timestamp, live_footfall))
            }
            Err(reason) => {
                debug!(stop_id = %stop_id, reason = %reason, "Station skipped");
                PollOutcome::Skipped { stop_id, reason }
            }
        })
        .collect();
    PollReport { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::crowding_api::LiveCrowding;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replays a scripted sequence of responses per station.
    struct ScriptedApi {
        script: Mutex<HashMap<String, Vec<anyhow::Result<LiveCrowding>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn new(entries: Vec<(&str, Vec<anyhow::Result<LiveCrowding>>)>) -> Self {
            let script = entries
                .into_iter()
                .map(|(id, mut responses)| {
                    responses.reverse();
                    (id.to_string(), responses)
                })
                .collect();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_for(&self, stop_id: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.as_str() == stop_id)
                .count()
        }
    }

    #[async_trait::async_trait]
    impl CrowdingApi for ScriptedApi {
        async fn live_crowding(&self, stop_id: &str) -> anyhow::Result<LiveCrowding> {
            self.calls.lock().unwrap().push(stop_id.to_string());
            self.script
                .lock()
                .unwrap()
                .get_mut(stop_id)
                .and_then(|responses| responses.pop())
                .unwrap_or_else(|| Err(anyhow::anyhow!("connection refused")))
        }
    }

    fn ok(percentage: f64) -> anyhow::Result<LiveCrowding> {
        Ok(LiveCrowding {
            percentage_of_baseline: Some(percentage),
        })
    }

    fn baseline(stop_id: &str, value: Option<f64>) -> FootfallBaseline {
        FootfallBaseline {
            stop_id: stop_id.to_string(),
            footfall_baseline: value,
        }
    }

    fn no_delay() -> PollPolicy {
        PollPolicy {
            max_attempts: 3,
            retry_delay: Duration::ZERO,
            request_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_poll_computes_live_footfall_in_order() {
        let api = ScriptedApi::new(vec![("A", vec![ok(0.5)]), ("B", vec![ok(0.25)])]);
        let poller = LivePoller::new(api, no_delay());

        let report = poller
            .poll(&[baseline("A", Some(100.0)), baseline("B", Some(200.0))])
            .await;
        let observations = report.observations();

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].stop_id, "A");
        assert_eq!(observations[0].live_footfall, 50.0);
        assert_eq!(observations[1].stop_id, "B");
        assert_eq!(observations[1].live_footfall, 50.0);
        assert_eq!(observations[0].timestamp, observations[1].timestamp);
    }

    #[tokio::test]
    async fn test_poll_retries_then_succeeds() {
        let api = ScriptedApi::new(vec![(
            "A",
            vec![Err(anyhow::anyhow!("timeout")), Err(anyhow::anyhow!("502")), ok(1.2)],
        )]);
        let poller = LivePoller::new(api, no_delay());

        let report = poller.poll(&[baseline("A", Some(10.0))]).await;

        assert_eq!(poller.api.calls_for("A"), 3);
        // Values above 100% of baseline pass through unclamped.
        assert_eq!(report.observations()[0].live_footfall, 12.0);
    }

    #[tokio::test]
    async fn test_poll_skips_after_final_attempt() {
        let api = ScriptedApi::new(vec![("B", vec![ok(0.1)])]);
        let poller = LivePoller::new(api, no_delay());

        let report = poller
            .poll(&[baseline("A", Some(10.0)), baseline("B", Some(10.0))])
            .await;

        assert_eq!(poller.api.calls_for("A"), 3);
        let observations = report.observations();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].stop_id, "B");

        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, "A");
        assert!(matches!(
            skipped[0].1,
            SkipReason::RequestFailed { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_poll_excludes_missing_percentage_and_unknown_baseline() {
        let api = ScriptedApi::new(vec![
            ("A", vec![Ok(LiveCrowding::default())]),
            ("B", vec![ok(0.5)]),
        ]);
        let poller = LivePoller::new(api, no_delay());

        let report = poller
            .poll(&[baseline("A", Some(10.0)), baseline("B", None)])
            .await;

        assert!(report.observations().is_empty());
        assert_eq!(poller.api.calls_for("B"), 0);
        let reasons: Vec<_> = report.skipped().map(|(_, r)| r.clone()).collect();
        assert_eq!(
            reasons,
            vec![SkipReason::MissingPercentage, SkipReason::UnknownBaseline]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_waits_between_retries_and_after_each_station() {
        let api = ScriptedApi::new(vec![("B", vec![ok(0.1)])]);
        let policy = PollPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            request_delay: Duration::from_secs(10),
        };
        let poller = LivePoller::new(api, policy);

        let start = tokio::time::Instant::now();
        let report = poller
            .poll(&[
                baseline("A", Some(10.0)),
                baseline("B", Some(10.0)),
                baseline("C", None),
            ])
            .await;
        let elapsed = start.elapsed();

        // A: two retry pauses plus its request pause; B: its request pause;
        // C is never requested.
        assert_eq!(report.observed_count(), 1);
        assert!(elapsed >= Duration::from_secs(22), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(23), "elapsed {elapsed:?}");
    }

    #[test]
    fn test_live_footfall_rejects_non_finite() {
        assert_eq!(live_footfall(100.0, -0.5), Ok(-50.0));
        assert!(live_footfall(f64::NAN, 0.5).is_err());
        assert!(live_footfall(f64::MAX, 10.0).is_err());
    }
}

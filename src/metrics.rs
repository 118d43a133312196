// Metrics hooks for the matching engine.
//
// Callers install a global `MatchMetrics` implementation via [`set_match_metrics`],
// then pool builds and swipes report their latency and outcome. This keeps
// instrumentation decoupled from any specific metrics backend.
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use crate::profile::SwipeAction;
use crate::session::SwipeStatus;

/// Metrics observer for the matching engine.
pub trait MatchMetrics: Send + Sync {
    /// Record a finished pool build.
    ///
    /// `fetched` is the number of profiles the store returned, `admitted` the
    /// number that survived the exclusion and mutual-preference filters.
    /// A failed query reports `fetched == admitted == 0` with `ok == false`.
    fn record_pool_build(&self, latency: Duration, fetched: usize, admitted: usize, ok: bool);

    /// Record the outcome of a single swipe, including its write sequence.
    fn record_swipe(&self, action: SwipeAction, status: SwipeStatus, latency: Duration);
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn MatchMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn MatchMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn MatchMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Install or clear the global match metrics recorder.
///
/// This is typically called once during startup so every session shares the
/// same metrics backend.
pub fn set_match_metrics(recorder: Option<Arc<dyn MatchMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

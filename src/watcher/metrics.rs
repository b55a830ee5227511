use std::collections::BTreeMap;
use std::sync::Mutex;

pub const LAST_SYNCED_GAUGE: &str = "watcher_last_synced";
pub const CHANGES_DETECTED_GAUGE: &str = "watcher_changes_detected";
pub const ERRORS_GAUGE: &str = "watcher_errors";
pub const SYNC_DURATION_HISTOGRAM: &str = "watcher_sync_duration_seconds";

/// Histogram buckets for cycle duration, in seconds (1 to 15 minutes).
pub const SYNC_DURATION_BUCKETS_SECS: [f64; 8] =
    [60.0, 120.0, 240.0, 360.0, 480.0, 600.0, 720.0, 900.0];

/// Injected metrics surface.
///
/// Gauges follow reset-then-accumulate semantics per cycle and have a single
/// writer, since cycles never overlap. Exposition transport is someone else's
/// problem; the orchestrator only talks to this trait.
pub trait MetricsSink: Send + Sync {
    fn set_gauge(&self, name: &str, value: f64);
    fn inc_gauge(&self, name: &str);
    fn observe_histogram(&self, name: &str, value: f64);
}

/// In-process sink backing the scrape endpoint and the tests.
#[derive(Default)]
pub struct InMemoryMetrics {
    gauges: Mutex<BTreeMap<String, f64>>,
    observations: Mutex<BTreeMap<String, Vec<f64>>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        lock_or_recover(&self.gauges).get(name).copied()
    }

    pub fn observations(&self, name: &str) -> Vec<f64> {
        lock_or_recover(&self.observations)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn set_gauge(&self, name: &str, value: f64) {
        lock_or_recover(&self.gauges).insert(name.to_string(), value);
    }

    fn inc_gauge(&self, name: &str) {
        let mut gauges = lock_or_recover(&self.gauges);
        let entry = gauges.entry(name.to_string()).or_insert(0.0);
        *entry += 1.0;
    }

    fn observe_histogram(&self, name: &str, value: f64) {
        lock_or_recover(&self.observations)
            .entry(name.to_string())
            .or_default()
            .push(value);
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_set_and_inc() {
        let metrics = InMemoryMetrics::new();
        assert_eq!(metrics.gauge(ERRORS_GAUGE), None);

        metrics.set_gauge(ERRORS_GAUGE, 0.0);
        metrics.inc_gauge(ERRORS_GAUGE);
        metrics.inc_gauge(ERRORS_GAUGE);
        assert_eq!(metrics.gauge(ERRORS_GAUGE), Some(2.0));

        // Reset-then-accumulate: a new cycle starts from zero.
        metrics.set_gauge(ERRORS_GAUGE, 0.0);
        assert_eq!(metrics.gauge(ERRORS_GAUGE), Some(0.0));
    }

    #[test]
    fn test_inc_without_prior_set_starts_at_zero() {
        let metrics = InMemoryMetrics::new();
        metrics.inc_gauge(CHANGES_DETECTED_GAUGE);
        assert_eq!(metrics.gauge(CHANGES_DETECTED_GAUGE), Some(1.0));
    }

    #[test]
    fn test_histogram_collects_observations() {
        let metrics = InMemoryMetrics::new();
        metrics.observe_histogram(SYNC_DURATION_HISTOGRAM, 12.5);
        metrics.observe_histogram(SYNC_DURATION_HISTOGRAM, 100.0);
        assert_eq!(
            metrics.observations(SYNC_DURATION_HISTOGRAM),
            vec![12.5, 100.0]
        );
    }
}

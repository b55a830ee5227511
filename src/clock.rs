use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

const HOUR_SECS: u64 = 3_600;

/// Wall-clock hour ticker.
///
/// Subscribers get one callback per hour boundary carrying the boundary's unix
/// timestamp (always an exact hour multiple). The returned handle unsubscribes
/// when stopped or dropped.
pub struct Clock;

impl Clock {
    pub fn on_new_hour<F>(callback: F) -> ClockHandle
    where
        F: Fn(u64) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            loop {
                let now = unix_now();
                let next = next_hour_boundary(now);
                tokio::time::sleep(Duration::from_secs(next.saturating_sub(now))).await;
                tracing::debug!(timestamp = next, "[CLOCK] hour boundary reached");
                callback(next);
            }
        });
        ClockHandle { handle }
    }
}

pub struct ClockHandle {
    handle: JoinHandle<()>,
}

impl ClockHandle {
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Next exact hour boundary strictly after `now`.
pub fn next_hour_boundary(now: u64) -> u64 {
    now - now % HOUR_SECS + HOUR_SECS
}

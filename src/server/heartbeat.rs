//! Per-session heartbeat timer
//!
//! An owned, cancellable ticker. Each session holds exactly one and cancels it
//! on teardown; once cancelled, `tick` never resolves again.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::warn;

/// Recurring timer driving a session's heartbeat
#[derive(Debug)]
pub struct HeartbeatTimer {
    interval: Option<Interval>,
}

impl HeartbeatTimer {
    /// Start a timer whose first tick fires one full `period` from now
    ///
    /// Must be called from within a Tokio runtime. `period` must be non-zero.
    /// A period too long to schedule yields a timer that never ticks.
    pub fn start(period: Duration) -> Self {
        let Some(first) = Instant::now().checked_add(period) else {
            warn!("Heartbeat period {:?} cannot be scheduled, timer disabled", period);
            return Self { interval: None };
        };
        let mut interval = time::interval_at(first, period);
        // A stalled session should resume ticking, not fire a burst of catch-up ticks
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(interval),
        }
    }

    /// Wait for the next tick
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Stop the timer. Returns `true` if it was still running.
    pub fn cancel(&mut self) -> bool {
        self.interval.take().is_some()
    }

    /// Whether the timer is still running
    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_full_period() {
        let start = Instant::now();
        let mut timer = HeartbeatTimer::start(Duration::from_secs(5));

        timer.tick().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));

        timer.tick().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let mut timer = HeartbeatTimer::start(Duration::from_secs(1));
        assert!(timer.is_active());
        assert!(timer.cancel());
        assert!(!timer.is_active());
        // Second cancel is a no-op
        assert!(!timer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_ticks() {
        let mut timer = HeartbeatTimer::start(Duration::from_secs(1));
        timer.cancel();

        let result = time::timeout(Duration::from_secs(60), timer.tick()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unschedulable_period_does_not_panic() {
        let mut timer = HeartbeatTimer::start(Duration::from_secs(u64::MAX));
        assert!(!timer.is_active());

        let result = time::timeout(Duration::from_secs(3600), timer.tick()).await;
        assert!(result.is_err());
    }
}

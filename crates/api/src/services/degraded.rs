//! Consecutive-failure tracking for an outbound channel.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use tracing::{info, warn};

/// Point-in-time view of a channel, as reported by readiness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub configured: bool,
    pub degraded: bool,
    pub consecutive_failures: u32,
}

/// Counts consecutive failures of one channel.
///
/// Crossing the threshold logs a single degraded-mode warning; the next
/// success logs recovery and resets the count. Nothing is retried.
#[derive(Debug)]
pub struct ChannelHealth {
    name: &'static str,
    threshold: u32,
    consecutive_failures: AtomicU32,
}

impl ChannelHealth {
    #[must_use]
    pub const fn new(name: &'static str, threshold: u32) -> Self {
        Self {
            name,
            threshold,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn record_success(&self) {
        let previous = self.consecutive_failures.swap(0, Ordering::AcqRel);
        if previous >= self.threshold && self.threshold > 0 {
            info!(channel = self.name, failures = previous, "Channel recovered");
        }
    }

    pub fn record_failure(&self) {
        let failures = self
            .consecutive_failures
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1);
        if failures == self.threshold {
            warn!(
                channel = self.name,
                failures, "Channel degraded: consecutive failures reached threshold"
            );
        }
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.threshold > 0 && self.consecutive_failures() >= self.threshold
    }

    #[must_use]
    pub fn status(&self, configured: bool) -> ChannelStatus {
        ChannelStatus {
            configured,
            degraded: self.is_degraded(),
            consecutive_failures: self.consecutive_failures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrades_at_threshold_and_recovers() {
        let health = ChannelHealth::new("sms", 3);
        health.record_failure();
        health.record_failure();
        assert!(!health.is_degraded());

        health.record_failure();
        assert!(health.is_degraded());
        assert_eq!(health.consecutive_failures(), 3);

        health.record_success();
        assert!(!health.is_degraded());
        assert_eq!(health.consecutive_failures(), 0);
    }

    #[test]
    fn test_status_reports_degraded_state() {
        let health = ChannelHealth::new("order_sync", 1);
        health.record_failure();

        assert_eq!(
            health.status(true),
            ChannelStatus {
                configured: true,
                degraded: true,
                consecutive_failures: 1,
            }
        );
    }

    #[test]
    fn test_zero_threshold_never_degrades() {
        let health = ChannelHealth::new("sms", 0);
        health.record_failure();
        assert!(!health.is_degraded());
    }
}

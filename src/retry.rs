//! Fixed-interval polling budgets.

use std::time::{Duration, Instant};

/// Default wall-clock budget for discovering an instance's network attributes.
pub const ATTRIBUTE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default pause between network attribute lookups.
pub const ATTRIBUTE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default wall-clock budget for a node's certificate request to appear.
pub const CERTIFICATE_TIMEOUT: Duration = Duration::from_secs(900);

/// Default pause between certificate request listings.
pub const CERTIFICATE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// A wall-clock budget plus the pause taken between attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total time after which polling gives up.
    pub timeout: Duration,
    /// Pause between two attempts.
    pub interval: Duration,
}

impl RetryPolicy {
    /// Creates a policy from a budget and interval.
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Policy used while waiting for IP and subnet information.
    #[must_use]
    pub const fn attribute_discovery() -> Self {
        Self::new(ATTRIBUTE_TIMEOUT, ATTRIBUTE_POLL_INTERVAL)
    }

    /// Policy used while waiting for a certificate signing request.
    #[must_use]
    pub const fn certificate_signing() -> Self {
        Self::new(CERTIFICATE_TIMEOUT, CERTIFICATE_POLL_INTERVAL)
    }

    /// Returns a copy with a different timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Instant at which a poll loop begun at `started` gives up.
    ///
    /// Saturates at `started` plus the largest representable budget instead
    /// of overflowing.
    #[must_use]
    pub fn deadline_from(&self, started: Instant) -> Instant {
        started
            .checked_add(self.timeout)
            .unwrap_or_else(|| started + Duration::from_secs(u64::from(u32::MAX)))
    }

    /// Returns `true` once the budget measured from `started` is spent.
    #[must_use]
    pub fn is_exhausted(&self, started: Instant) -> bool {
        Instant::now() >= self.deadline_from(started)
    }
}

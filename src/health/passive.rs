//! Passive health checking (failure detection).
//!
//! # Responsibilities
//! - Observe transport results of normal forwarding
//! - Track the transport failure rate over a trailing window
//! - Exclude the destination for a reactivation period once the rate
//!   crosses the threshold
//!
//! # Design Decisions
//! - Only connection-level failures count; any HTTP response (5xx included)
//!   proves the destination is reachable
//! - Exclusion ends lazily: the first check after the reactivation period
//!   clears it and resets the window
//! - Results observed while excluded are ignored; they belong to calls
//!   started before the exclusion

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::PassiveHealthConfig;
use crate::resilience::window::{SampleWindow, Tally};

/// Result of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Eligible,
    Excluded,
    /// The reactivation period just ended; the destination is eligible again.
    Reactivated,
}

#[derive(Debug)]
struct Inner {
    window: SampleWindow,
    excluded_until: Option<Instant>,
}

#[derive(Debug)]
pub struct PassiveHealth {
    enabled: bool,
    failure_rate_threshold: f64,
    minimum_requests: usize,
    reactivation: Duration,
    inner: Mutex<Inner>,
}

impl PassiveHealth {
    pub fn new(config: &PassiveHealthConfig) -> Self {
        Self {
            enabled: config.enabled,
            failure_rate_threshold: config.failure_rate_threshold,
            minimum_requests: config.minimum_requests.max(1),
            reactivation: Duration::from_secs(config.reactivation_secs),
            inner: Mutex::new(Inner {
                window: SampleWindow::new(Duration::from_secs(config.window_secs), config.window_capacity),
                excluded_until: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one forwarding result. Returns the tally when this result
    /// caused an exclusion.
    pub fn record(&self, transport_failed: bool) -> Option<Tally> {
        if !self.enabled {
            return None;
        }

        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        if let Some(until) = inner.excluded_until {
            if now < until {
                return None;
            }
            inner.excluded_until = None;
            inner.window.reset();
        }

        inner.window.record(now, transport_failed);
        let tally = inner.window.tally(now);
        if transport_failed
            && tally.total >= self.minimum_requests
            && tally.failure_ratio() > self.failure_rate_threshold
        {
            inner.excluded_until = Some(now + self.reactivation);
            return Some(tally);
        }
        None
    }

    /// Check eligibility, ending an expired exclusion.
    pub fn check(&self) -> Exclusion {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.excluded_until {
            None => Exclusion::Eligible,
            Some(until) if Instant::now() < until => Exclusion::Excluded,
            Some(_) => {
                inner.excluded_until = None;
                inner.window.reset();
                Exclusion::Reactivated
            }
        }
    }

    /// Time left in the current exclusion, without ending it.
    pub fn excluded_for(&self) -> Option<Duration> {
        let until = self.lock().excluded_until?;
        let remaining = until.saturating_duration_since(Instant::now());
        (!remaining.is_zero()).then_some(remaining)
    }
}

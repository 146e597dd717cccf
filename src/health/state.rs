//! Destination health state machine (active signal).
//!
//! # States
//! - Unknown: not probed yet, receives traffic
//! - Healthy: destination receives traffic
//! - Unhealthy: destination excluded from selection
//!
//! # State Transitions
//! ```text
//! Unknown/Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unknown/Unhealthy → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - Each report returns the transition it caused, so callers can log and
//!   publish it
//! - Counters reset on state transition

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

/// Probe-driven health of one destination.
#[derive(Debug)]
pub struct ActiveHealth {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    healthy_threshold: u32,
    unhealthy_threshold: u32,
}

impl ActiveHealth {
    pub fn new(healthy_threshold: u32, unhealthy_threshold: u32) -> Self {
        Self {
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            healthy_threshold: healthy_threshold.max(1),
            unhealthy_threshold: unhealthy_threshold.max(1),
        }
    }

    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// Healthy or Unknown.
    pub fn is_healthy(&self) -> bool {
        self.state() != HealthState::Unhealthy
    }

    /// Report a successful probe. Returns the new state on a transition.
    pub fn mark_success(&self) -> Option<HealthState> {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.state() == HealthState::Healthy {
            return None;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= self.healthy_threshold {
            self.consecutive_successes.store(0, Ordering::Relaxed);
            let previous = self.state.swap(HealthState::Healthy as u8, Ordering::AcqRel);
            if previous != HealthState::Healthy as u8 {
                return Some(HealthState::Healthy);
            }
        }
        None
    }

    /// Report a failed probe. Returns the new state on a transition.
    pub fn mark_failure(&self) -> Option<HealthState> {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.state() == HealthState::Unhealthy {
            return None;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.unhealthy_threshold {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            let previous = self.state.swap(HealthState::Unhealthy as u8, Ordering::AcqRel);
            if previous != HealthState::Unhealthy as u8 {
                return Some(HealthState::Unhealthy);
            }
        }
        None
    }
}

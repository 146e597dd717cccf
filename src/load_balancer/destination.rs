//! Destination abstraction.
//!
//! # Responsibilities
//! - Represent a single backend endpoint of a cluster
//! - Combine active (probe) and passive (transport) health into one
//!   eligibility decision
//! - Publish health transitions on the event bus

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use crate::config::{DestinationConfig, HealthCheckConfig, PassiveHealthConfig};
use crate::health::passive::{Exclusion, PassiveHealth};
use crate::health::state::{ActiveHealth, HealthState};
use crate::pipeline::events::{EventBus, HealthSignal, PipelineEvent};

/// A single backend endpoint.
#[derive(Debug)]
pub struct Destination {
    pub name: String,
    pub cluster: String,
    /// Base URL; request paths are appended to it.
    pub base_url: Url,
    active: ActiveHealth,
    passive: PassiveHealth,
    last_probe: Mutex<Option<Instant>>,
    events: EventBus,
}

impl Destination {
    pub fn new(
        config: &DestinationConfig,
        health_check: &HealthCheckConfig,
        passive_health: &PassiveHealthConfig,
        events: EventBus,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            name: config.name.clone(),
            cluster: config.cluster.clone(),
            base_url: Url::parse(&config.address)?,
            active: ActiveHealth::new(health_check.healthy_threshold, health_check.unhealthy_threshold),
            passive: PassiveHealth::new(passive_health),
            last_probe: Mutex::new(None),
            events,
        })
    }

    /// Eligible for selection: not marked unhealthy by probes and not
    /// excluded by observed transport failures. Either signal excludes.
    pub fn is_eligible(&self) -> bool {
        self.active.is_healthy() && self.passive_eligible()
    }

    fn passive_eligible(&self) -> bool {
        match self.passive.check() {
            Exclusion::Eligible => true,
            Exclusion::Excluded => false,
            Exclusion::Reactivated => {
                tracing::info!(destination = %self.name, "Destination reactivated after passive exclusion");
                self.publish_transition(HealthState::Healthy, HealthSignal::Passive);
                true
            }
        }
    }

    pub fn active_state(&self) -> HealthState {
        self.active.state()
    }

    /// Remaining passive exclusion, if any.
    pub fn passive_exclusion(&self) -> Option<Duration> {
        self.passive.excluded_for()
    }

    /// Apply one active probe result.
    pub fn record_probe(&self, healthy: bool) {
        *self.last_probe.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());

        let transition = if healthy {
            self.active.mark_success()
        } else {
            self.active.mark_failure()
        };

        if let Some(state) = transition {
            tracing::warn!(
                destination = %self.name,
                state = state.as_str(),
                "Active health state changed"
            );
            self.publish_transition(state, HealthSignal::Active);
        }
    }

    /// Apply the transport result of one forwarded attempt.
    pub fn record_transport_result(&self, transport_failed: bool) {
        if let Some(tally) = self.passive.record(transport_failed) {
            tracing::warn!(
                destination = %self.name,
                failures = tally.failures,
                total = tally.total,
                "Destination excluded after transport failures"
            );
            self.publish_transition(HealthState::Unhealthy, HealthSignal::Passive);
        }
    }

    /// Time since the last active probe.
    pub fn last_probe_age(&self) -> Option<Duration> {
        self.last_probe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|at| at.elapsed())
    }

    /// Absolute URL for `path_and_query` on this destination.
    pub fn url_for(&self, path_and_query: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        if path_and_query.starts_with('/') {
            format!("{base}{path_and_query}")
        } else {
            format!("{base}/{path_and_query}")
        }
    }

    fn publish_transition(&self, state: HealthState, signal: HealthSignal) {
        let destination = self.name.clone();
        let event = match state {
            HealthState::Unhealthy => PipelineEvent::DestinationUnhealthy { destination, signal },
            HealthState::Healthy | HealthState::Unknown => {
                PipelineEvent::DestinationHealthy { destination, signal }
            }
        };
        self.events.publish(event);
    }
}

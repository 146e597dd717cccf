//! Structured strategy events.
//!
//! Every strategy publishes its state transitions on one broadcast bus.
//! Observability consumers subscribe without knowing strategy internals;
//! publishing never blocks and never fails the pipeline.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::error::RejectReason;

/// Which health signal changed a destination's eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthSignal {
    Active,
    Passive,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    AdmissionRejected {
        request_id: String,
        reason: RejectReason,
    },
    DeadlineExceeded {
        request_id: String,
        budget: Duration,
    },
    HedgeTriggered {
        request_id: String,
        cluster: String,
        hedge_index: u32,
    },
    RetryAttempted {
        request_id: String,
        cluster: String,
        branch: u32,
        attempt: u32,
        delay: Duration,
        error_kind: &'static str,
    },
    /// A retry was due but its backoff would not fit in the remaining budget.
    RetrySkipped {
        request_id: String,
        cluster: String,
        branch: u32,
        attempt: u32,
        delay: Duration,
        remaining: Duration,
    },
    CircuitOpened {
        cluster: String,
        failures: usize,
        total: usize,
    },
    CircuitHalfOpened {
        cluster: String,
    },
    CircuitClosed {
        cluster: String,
    },
    /// A half-open trial failed and the break restarted.
    CircuitReopened {
        cluster: String,
    },
    DestinationUnhealthy {
        destination: String,
        signal: HealthSignal,
    },
    DestinationHealthy {
        destination: String,
        signal: HealthSignal,
    },
}

impl PipelineEvent {
    /// Stable event name for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::AdmissionRejected { .. } => "admission_rejected",
            PipelineEvent::DeadlineExceeded { .. } => "deadline_exceeded",
            PipelineEvent::HedgeTriggered { .. } => "hedge_triggered",
            PipelineEvent::RetryAttempted { .. } => "retry_attempted",
            PipelineEvent::RetrySkipped { .. } => "retry_skipped",
            PipelineEvent::CircuitOpened { .. } => "circuit_opened",
            PipelineEvent::CircuitHalfOpened { .. } => "circuit_half_opened",
            PipelineEvent::CircuitClosed { .. } => "circuit_closed",
            PipelineEvent::CircuitReopened { .. } => "circuit_reopened",
            PipelineEvent::DestinationUnhealthy { .. } => "destination_unhealthy",
            PipelineEvent::DestinationHealthy { .. } => "destination_healthy",
        }
    }
}

/// Broadcast channel every strategy publishes to.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Dropped silently when nobody is subscribed.
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

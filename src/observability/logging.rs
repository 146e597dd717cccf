//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (level, format)
//! - Consume pipeline events: log each one and count it
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level
//! - The event consumer never blocks publishers; when it falls behind it
//!   logs how many events it missed and carries on

use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::observability::metrics;
use crate::pipeline::events::PipelineEvent;

fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.log_level;
        EnvFilter::new(format!("resilient_gateway={level},tower_http={level}"))
    })
}

/// Install the global subscriber.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::AdmissionRejected { request_id, reason } => {
            tracing::debug!(request_id = %request_id, reason = reason.as_str(), "admission_rejected");
        }
        PipelineEvent::DeadlineExceeded { request_id, budget } => {
            tracing::debug!(request_id = %request_id, budget_ms = budget.as_millis() as u64, "deadline_exceeded");
        }
        PipelineEvent::HedgeTriggered {
            request_id,
            cluster,
            hedge_index,
        } => {
            tracing::debug!(request_id = %request_id, cluster = %cluster, hedge_index, "hedge_triggered");
        }
        PipelineEvent::RetryAttempted {
            request_id,
            cluster,
            branch,
            attempt,
            delay,
            error_kind,
        } => {
            tracing::debug!(
                request_id = %request_id,
                cluster = %cluster,
                branch,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error_kind,
                "retry_attempted"
            );
        }
        PipelineEvent::RetrySkipped {
            request_id,
            cluster,
            branch,
            attempt,
            delay,
            remaining,
        } => {
            tracing::debug!(
                request_id = %request_id,
                cluster = %cluster,
                branch,
                attempt,
                delay_ms = delay.as_millis() as u64,
                remaining_ms = remaining.as_millis() as u64,
                "retry_skipped"
            );
        }
        PipelineEvent::CircuitOpened {
            cluster,
            failures,
            total,
        } => {
            tracing::warn!(cluster = %cluster, failures, total, "circuit_opened");
        }
        PipelineEvent::CircuitReopened { cluster } => {
            tracing::warn!(cluster = %cluster, "circuit_reopened");
        }
        PipelineEvent::CircuitHalfOpened { cluster } => {
            tracing::info!(cluster = %cluster, "circuit_half_opened");
        }
        PipelineEvent::CircuitClosed { cluster } => {
            tracing::info!(cluster = %cluster, "circuit_closed");
        }
        PipelineEvent::DestinationUnhealthy { destination, signal } => {
            metrics::record_destination_health(destination, false);
            tracing::warn!(destination = %destination, signal = ?signal, "destination_unhealthy");
        }
        PipelineEvent::DestinationHealthy { destination, signal } => {
            metrics::record_destination_health(destination, true);
            tracing::info!(destination = %destination, signal = ?signal, "destination_healthy");
        }
    }
}

/// Log and count pipeline events until the bus closes or shutdown fires.
/// Returns the number of events handled.
pub async fn log_events(
    mut events: broadcast::Receiver<PipelineEvent>,
    mut shutdown: broadcast::Receiver<()>,
) -> u64 {
    let mut handled = 0;
    loop {
        tokio::select! {
            biased;
            received = events.recv() => match received {
                Ok(event) => {
                    log_event(&event);
                    metrics::record_event(event.name());
                    handled += 1;
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event consumer lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    handled
}

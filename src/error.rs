//! Failure taxonomy shared by every pipeline stage.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::context::UpstreamResponse;

/// Why the admission limiter turned a caller away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The wait queue was already full.
    QueueFull,
    /// The caller waited in the queue longer than its timeout.
    QueueTimeout,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::QueueFull => "queue_full",
            RejectReason::QueueTimeout => "queue_timeout",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error of one logical operation or of a single attempt.
///
/// `UpstreamFailure` and `ClientFailure` carry the buffered destination
/// response so the caller still receives what the destination said.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("admission rejected: {0}")]
    AdmissionRejected(RejectReason),

    #[error("circuit open for cluster '{cluster}'")]
    CircuitOpen { cluster: String },

    #[error("no healthy destination in cluster '{cluster}'")]
    NoHealthyDestination { cluster: String },

    #[error("deadline of {budget:?} exceeded")]
    Timeout { budget: Duration },

    #[error("transport failure talking to '{destination}': {message}")]
    TransportFailure { destination: String, message: String },

    /// The destination answered, but its body did not fit the buffer limit.
    #[error("response from '{destination}' exceeds {limit} bytes")]
    ResponseTooLarge { destination: String, limit: usize },

    #[error("destination '{}' answered {}", .0.destination, .0.status)]
    UpstreamFailure(Box<UpstreamResponse>),

    #[error("destination '{}' rejected the request with {}", .0.destination, .0.status)]
    ClientFailure(Box<UpstreamResponse>),
}

impl GatewayError {
    /// Stable snake_case name used in logs, metrics and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::AdmissionRejected(_) => "admission_rejected",
            GatewayError::CircuitOpen { .. } => "circuit_open",
            GatewayError::NoHealthyDestination { .. } => "no_healthy_destination",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::TransportFailure { .. } => "transport_failure",
            GatewayError::ResponseTooLarge { .. } => "response_too_large",
            GatewayError::UpstreamFailure(_) => "upstream_failure",
            GatewayError::ClientFailure(_) => "client_failure",
        }
    }

    /// True when the error came back from an actual call to a destination,
    /// as opposed to a rejection by one of the gateway's own layers.
    pub fn is_destination_outcome(&self) -> bool {
        matches!(
            self,
            GatewayError::TransportFailure { .. }
                | GatewayError::ResponseTooLarge { .. }
                | GatewayError::UpstreamFailure(_)
                | GatewayError::ClientFailure(_)
        )
    }

    /// Ranking used to pick the most informative failure among several
    /// finished attempts. Higher is more specific.
    pub fn specificity(&self) -> u8 {
        match self {
            GatewayError::ClientFailure(_) => 7,
            GatewayError::ResponseTooLarge { .. } => 6,
            GatewayError::UpstreamFailure(_) => 5,
            GatewayError::TransportFailure { .. } => 4,
            GatewayError::NoHealthyDestination { .. } => 3,
            GatewayError::CircuitOpen { .. } => 2,
            GatewayError::Timeout { .. } => 1,
            GatewayError::AdmissionRejected(_) => 0,
        }
    }

    /// The destination response carried by this error, if any.
    pub fn response(&self) -> Option<&UpstreamResponse> {
        match self {
            GatewayError::UpstreamFailure(resp) | GatewayError::ClientFailure(resp) => Some(resp),
            _ => None,
        }
    }
}

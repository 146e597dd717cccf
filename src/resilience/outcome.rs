//! Outcome classification.
//!
//! Maps what came back from a destination (a response status, a transport
//! error, or a gateway rejection) onto the tri-state outcome every strategy
//! reasons about.

use axum::http::StatusCode;

use crate::error::GatewayError;

/// Classified result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Worth trying again: connection errors, 5xx, 408 and 429.
    RetryableFailure,
    /// Must not be retried: other 4xx and every gateway rejection.
    FatalFailure,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }

    pub fn is_failure(self) -> bool {
        !self.is_success()
    }
}

/// Classify a response status code.
pub fn classify_status(status: StatusCode) -> Outcome {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => Outcome::RetryableFailure,
        s if s.is_server_error() => Outcome::RetryableFailure,
        s if s.is_client_error() => Outcome::FatalFailure,
        _ => Outcome::Success,
    }
}

/// Classify an error raised anywhere in the pipeline.
pub fn classify_error(error: &GatewayError) -> Outcome {
    match error {
        GatewayError::TransportFailure { .. } | GatewayError::UpstreamFailure(_) => {
            Outcome::RetryableFailure
        }
        GatewayError::ClientFailure(_)
        | GatewayError::ResponseTooLarge { .. }
        | GatewayError::AdmissionRejected(_)
        | GatewayError::CircuitOpen { .. }
        | GatewayError::NoHealthyDestination { .. }
        | GatewayError::Timeout { .. } => Outcome::FatalFailure,
    }
}

/// Classify the result of an attempt.
pub fn classify<T>(result: &Result<T, GatewayError>) -> Outcome {
    match result {
        Ok(_) => Outcome::Success,
        Err(e) => classify_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectReason;
    use std::time::Duration;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::OK), Outcome::Success);
        assert_eq!(classify_status(StatusCode::NO_CONTENT), Outcome::Success);
        assert_eq!(classify_status(StatusCode::MOVED_PERMANENTLY), Outcome::Success);
        assert_eq!(classify_status(StatusCode::INTERNAL_SERVER_ERROR), Outcome::RetryableFailure);
        assert_eq!(classify_status(StatusCode::SERVICE_UNAVAILABLE), Outcome::RetryableFailure);
        assert_eq!(classify_status(StatusCode::REQUEST_TIMEOUT), Outcome::RetryableFailure);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), Outcome::RetryableFailure);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), Outcome::FatalFailure);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), Outcome::FatalFailure);
    }

    #[test]
    fn test_rejections_are_fatal() {
        let errors = [
            GatewayError::AdmissionRejected(RejectReason::QueueFull),
            GatewayError::CircuitOpen { cluster: "c".into() },
            GatewayError::NoHealthyDestination { cluster: "c".into() },
            GatewayError::Timeout { budget: Duration::from_secs(1) },
            GatewayError::ResponseTooLarge { destination: "d1".into(), limit: 16 },
        ];
        for e in &errors {
            assert_eq!(classify_error(e), Outcome::FatalFailure, "{e}");
        }

        let transport = GatewayError::TransportFailure {
            destination: "d1".into(),
            message: "connection refused".into(),
        };
        assert_eq!(classify::<()>(&Err(transport)), Outcome::RetryableFailure);
        assert_eq!(classify::<()>(&Ok(())), Outcome::Success);
    }
}

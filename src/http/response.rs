//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn a pipeline result into the client response
//! - Map gateway-originated failures to HTTP status codes
//! - Stamp the handled-by header on every response
//!
//! # Design Decisions
//! - A destination's own response (2xx, 4xx or final 5xx) is relayed as-is
//! - Gateway failures get a small JSON body: `{"error": kind, "message": ...}`
//! - Admission rejections carry `Retry-After` so well-behaved callers back off

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::GatewayError;
use crate::pipeline::context::UpstreamResponse;
use crate::pipeline::middleware::PipelineResult;

/// Seconds a rejected caller is asked to wait before trying again.
const RETRY_AFTER_SECS: &str = "1";

impl GatewayError {
    /// Status code the caller sees when no destination response is relayed.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AdmissionRejected(_)
            | GatewayError::CircuitOpen { .. }
            | GatewayError::NoHealthyDestination { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::TransportFailure { .. } | GatewayError::ResponseTooLarge { .. } => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::UpstreamFailure(resp) | GatewayError::ClientFailure(resp) => resp.status,
        }
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::UpstreamFailure(resp) | GatewayError::ClientFailure(resp) => {
                (*resp).into_response()
            }
            other => {
                let status = other.status_code();
                let body = Json(json!({
                    "error": other.kind(),
                    "message": other.to_string(),
                }));
                let mut response = (status, body).into_response();
                if matches!(other, GatewayError::AdmissionRejected(_)) {
                    response
                        .headers_mut()
                        .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
                }
                response
            }
        }
    }
}

pub fn into_response(result: PipelineResult) -> Response {
    match result {
        Ok(upstream) => upstream.into_response(),
        Err(error) => error.into_response(),
    }
}

/// JSON error for requests rejected before they reach the pipeline.
pub fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    let message: String = message.into();
    (status, Json(json!({ "error": kind, "message": message }))).into_response()
}

/// The header identifying this gateway on responses.
#[derive(Debug, Clone)]
pub struct HandledBy {
    name: HeaderName,
    value: HeaderValue,
}

impl HandledBy {
    pub fn new(name: &str, value: &str) -> Result<Self, axum::http::Error> {
        Ok(Self {
            name: HeaderName::from_bytes(name.as_bytes())?,
            value: HeaderValue::from_str(value)?,
        })
    }
}

/// Response mapper for `axum::middleware::map_response_with_state`.
pub async fn inject_handled_by(State(handled_by): State<HandledBy>, mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(handled_by.name.clone(), handled_by.value.clone());
    response
}

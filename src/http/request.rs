//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) and echo it on the response
//! - Buffer the inbound body once, within the configured size limit
//! - Snapshot the request into an immutable `RequestContext`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The request ID is the correlation identifier of every attempt
//! - Buffering makes the body replayable for retries and hedges

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use uuid::Uuid;

use crate::pipeline::context::RequestContext;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Sets `x-request-id` on requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Copies `x-request-id` from the request onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Correlation identifier of a request, generating one if the header is
/// missing or not valid UTF-8.
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Buffer `request` and snapshot it for the pipeline.
///
/// `path_and_query` is what the destination will see (route prefix
/// already removed).
pub async fn into_context(
    request: Request<Body>,
    path_and_query: String,
    max_body_bytes: usize,
) -> Result<RequestContext, axum::Error> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, max_body_bytes).await?;
    let correlation_id = correlation_id(&parts.headers);
    Ok(RequestContext::new(
        parts.method,
        path_and_query,
        parts.headers,
        body,
        correlation_id,
    ))
}

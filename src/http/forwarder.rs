//! Outbound forwarding.
//!
//! # Responsibilities
//! - Build the upstream request for one attempt (URI rewrite, header hygiene,
//!   request id propagation)
//! - Perform the call and buffer the response body
//! - Report connection-level problems as `TransportFailure`, and a body
//!   over the buffer limit as `ResponseTooLarge`
//!
//! # Design Decisions
//! - The forwarder never classifies status codes; a response is a response.
//!   The pipeline decides what a status means
//! - Response bodies are buffered (bounded by `max_body_bytes`) so a failed
//!   attempt can be compared with, or replaced by, a later one
//! - Dropping the returned future drops the hyper call, which closes the
//!   connection instead of leaking it

use std::fmt::{Debug, Display};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri};
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::GatewayError;
use crate::http::request::X_REQUEST_ID;
use crate::load_balancer::destination::Destination;
use crate::pipeline::context::{RequestContext, UpstreamResponse};

/// Headers that only apply to a single connection.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

/// Performs one outbound call to one destination.
pub trait Forwarder: Send + Sync + Debug {
    fn forward<'a>(
        &'a self,
        destination: &'a Destination,
        request: &'a RequestContext,
    ) -> BoxFuture<'a, Result<UpstreamResponse, GatewayError>>;
}

/// Forwarder backed by a pooled hyper client.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    max_body_bytes: usize,
}

impl HttpForwarder {
    pub fn new(max_body_bytes: usize) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            max_body_bytes,
        }
    }

    fn build_request(
        &self,
        destination: &Destination,
        request: &RequestContext,
    ) -> Result<Request<Body>, axum::http::Error> {
        let uri = Uri::try_from(destination.url_for(&request.path_and_query))?;

        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);
        // hyper derives Host from the rewritten URI.
        headers.remove(header::HOST);
        if let Ok(value) = HeaderValue::from_str(&request.correlation_id) {
            headers.insert(X_REQUEST_ID, value);
        }

        let mut builder = Request::builder().method(request.method.clone()).uri(uri);
        if let Some(target) = builder.headers_mut() {
            *target = headers;
        }
        builder.body(Body::from(request.body.clone()))
    }
}

fn transport_failure(destination: &Destination, error: impl Display) -> GatewayError {
    GatewayError::TransportFailure {
        destination: destination.name.clone(),
        message: error.to_string(),
    }
}

enum BodyError {
    TooLarge,
    Read(axum::Error),
}

/// Buffer a response body, stopping as soon as it passes `limit`.
async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, BodyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(BodyError::TooLarge);
    }

    let mut stream = body.into_data_stream();
    let mut buffer = Vec::with_capacity(declared.unwrap_or(0));
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BodyError::Read)?;
        if buffer.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge);
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buffer))
}

impl Forwarder for HttpForwarder {
    fn forward<'a>(
        &'a self,
        destination: &'a Destination,
        request: &'a RequestContext,
    ) -> BoxFuture<'a, Result<UpstreamResponse, GatewayError>> {
        Box::pin(async move {
            let upstream = self
                .build_request(destination, request)
                .map_err(|e| transport_failure(destination, e))?;

            let response = self.client.request(upstream).await.map_err(|e| {
                tracing::debug!(
                    request_id = %request.correlation_id,
                    destination = %destination.name,
                    error = %e,
                    "Upstream connection error"
                );
                transport_failure(destination, e)
            })?;

            let (parts, body) = response.into_parts();
            let body = read_body(&parts.headers, Body::new(body), self.max_body_bytes)
                .await
                .map_err(|e| match e {
                    BodyError::TooLarge => {
                        tracing::warn!(
                            request_id = %request.correlation_id,
                            destination = %destination.name,
                            limit = self.max_body_bytes,
                            "Upstream response body over limit"
                        );
                        GatewayError::ResponseTooLarge {
                            destination: destination.name.clone(),
                            limit: self.max_body_bytes,
                        }
                    }
                    BodyError::Read(e) => transport_failure(destination, e),
                })?;

            let mut headers = parts.headers;
            strip_hop_by_hop(&mut headers);

            Ok(UpstreamResponse {
                destination: destination.name.clone(),
                status: parts.status,
                headers,
                body,
            })
        })
    }
}

//! Per-request and per-attempt state carried through the pipeline.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use tokio::time::Instant;

use crate::load_balancer::pool::Cluster;
use crate::pipeline::events::EventBus;
use crate::resilience::deadline::Deadline;
use crate::resilience::outcome::Outcome;

/// Immutable snapshot of an inbound request.
///
/// Built once at ingress with a fully buffered body, so every retried or
/// hedged attempt can replay it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Path and query forwarded to the destination (route prefix removed).
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Correlation identifier, taken from `x-request-id`.
    pub correlation_id: String,
}

impl RequestContext {
    pub fn new(
        method: Method,
        path_and_query: impl Into<String>,
        headers: HeaderMap,
        body: Bytes,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers,
            body,
            correlation_id: correlation_id.into(),
        }
    }

    /// Read-style requests, or any request carrying the idempotency header.
    pub fn is_hedge_eligible(&self, idempotency_header: &str) -> bool {
        self.method.is_safe() || self.has_header(idempotency_header)
    }

    /// Idempotent per HTTP semantics, or explicitly marked by the caller.
    pub fn is_idempotent(&self, idempotency_header: &str) -> bool {
        self.method.is_idempotent() || self.has_header(idempotency_header)
    }

    fn has_header(&self, name: &str) -> bool {
        !name.is_empty() && self.headers.contains_key(name)
    }
}

/// A destination response with its body fully buffered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Name of the destination that produced it.
    pub destination: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// State handed from one middleware to the next.
///
/// Cheap to clone: everything shared sits behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub request: Arc<RequestContext>,
    pub cluster: Arc<Cluster>,
    pub events: EventBus,
    /// Set by the deadline layer; `None` before it runs.
    pub deadline: Option<Deadline>,
    /// Hedge branch index; 0 is the primary.
    pub branch: u32,
    /// Try number within the branch, starting at 1.
    pub try_number: u32,
}

impl CallContext {
    pub fn new(request: Arc<RequestContext>, cluster: Arc<Cluster>, events: EventBus) -> Self {
        Self {
            request,
            cluster,
            events,
            deadline: None,
            branch: 0,
            try_number: 1,
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn for_branch(&self, branch: u32) -> Self {
        let mut ctx = self.clone();
        ctx.branch = branch;
        ctx.try_number = 1;
        ctx
    }

    pub fn for_try(&self, try_number: u32) -> Self {
        let mut ctx = self.clone();
        ctx.try_number = try_number;
        ctx
    }

    /// Budget left before the operation deadline, unbounded when no deadline is set.
    pub fn remaining_budget(&self) -> Duration {
        self.deadline.map(|d| d.remaining()).unwrap_or(Duration::MAX)
    }

    pub fn correlation_id(&self) -> &str {
        &self.request.correlation_id
    }
}

/// One outbound call to one destination.
#[derive(Debug)]
pub struct Attempt {
    pub branch: u32,
    pub sequence: u32,
    pub destination: String,
    pub started_at: Instant,
}

impl Attempt {
    pub fn start(ctx: &CallContext, destination: &str) -> Self {
        Self {
            branch: ctx.branch,
            sequence: ctx.try_number,
            destination: destination.to_string(),
            started_at: Instant::now(),
        }
    }

    /// Record the outcome and consume the attempt.
    pub fn finish(self, correlation_id: &str, outcome: Outcome) -> Duration {
        let duration = self.started_at.elapsed();
        tracing::debug!(
            request_id = %correlation_id,
            branch = self.branch,
            attempt = self.sequence,
            destination = %self.destination,
            outcome = ?outcome,
            duration_ms = duration.as_millis() as u64,
            "Attempt finished"
        );
        duration
    }
}

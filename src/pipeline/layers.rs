//! One middleware per resilience strategy, plus the forwarding endpoint.
//!
//! The strategies themselves live in `crate::resilience`; the layers adapt
//! them to the [`Middleware`] chain and publish their events.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::error::GatewayError;
use crate::http::forwarder::Forwarder;
use crate::pipeline::context::{Attempt, CallContext, UpstreamResponse};
use crate::pipeline::events::PipelineEvent;
use crate::pipeline::middleware::{Endpoint, Middleware, Next, PipelineResult};
use crate::resilience::admission::AdmissionLimiter;
use crate::resilience::deadline::Deadline;
use crate::resilience::hedging::HedgingPolicy;
use crate::resilience::outcome::{classify, classify_error, classify_status, Outcome};
use crate::resilience::retries::RetryPolicy;

/// Holds an admission slot for the whole logical operation.
#[derive(Debug)]
pub struct AdmissionLayer {
    limiter: Arc<AdmissionLimiter>,
    queue_timeout: Duration,
}

impl AdmissionLayer {
    pub fn new(limiter: Arc<AdmissionLimiter>, queue_timeout: Duration) -> Self {
        Self {
            limiter,
            queue_timeout,
        }
    }
}

impl Middleware for AdmissionLayer {
    fn handle<'a>(&'a self, ctx: CallContext, next: Next<'a>) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let _slot = match self.limiter.acquire(self.queue_timeout).await {
                Ok(slot) => slot,
                Err(reason) => {
                    tracing::warn!(
                        request_id = %ctx.correlation_id(),
                        reason = reason.as_str(),
                        in_flight = self.limiter.in_flight(),
                        queued = self.limiter.queued(),
                        "Admission rejected"
                    );
                    ctx.events.publish(PipelineEvent::AdmissionRejected {
                        request_id: ctx.correlation_id().to_string(),
                        reason,
                    });
                    return Err(GatewayError::AdmissionRejected(reason));
                }
            };
            next.run(ctx).await
        })
    }
}

/// Starts the operation deadline and cancels everything inside it on expiry.
#[derive(Debug)]
pub struct DeadlineLayer {
    budget: Duration,
}

impl DeadlineLayer {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }
}

impl Middleware for DeadlineLayer {
    fn handle<'a>(&'a self, ctx: CallContext, next: Next<'a>) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let deadline = Deadline::start(self.budget);
            let events = ctx.events.clone();
            let request_id = ctx.correlation_id().to_string();

            let result = deadline.run(next.run(ctx.with_deadline(deadline))).await;
            if let Err(GatewayError::Timeout { budget }) = &result {
                tracing::warn!(request_id = %request_id, budget_ms = budget.as_millis() as u64, "Deadline exceeded");
                events.publish(PipelineEvent::DeadlineExceeded {
                    request_id,
                    budget: *budget,
                });
            }
            result
        })
    }
}

/// Fails fast when the cluster has nothing eligible to call.
#[derive(Debug, Default)]
pub struct DestinationGate;

impl Middleware for DestinationGate {
    fn handle<'a>(&'a self, ctx: CallContext, next: Next<'a>) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            if !ctx.cluster.pool.has_eligible() {
                tracing::warn!(
                    request_id = %ctx.correlation_id(),
                    cluster = %ctx.cluster.name,
                    "No eligible destination"
                );
                return Err(GatewayError::NoHealthyDestination {
                    cluster: ctx.cluster.name.clone(),
                });
            }
            next.run(ctx).await
        })
    }
}

#[derive(Debug)]
pub struct HedgingLayer {
    policy: HedgingPolicy,
    idempotency_header: String,
}

impl HedgingLayer {
    pub fn new(policy: HedgingPolicy, idempotency_header: impl Into<String>) -> Self {
        Self {
            policy,
            idempotency_header: idempotency_header.into(),
        }
    }
}

impl Middleware for HedgingLayer {
    fn handle<'a>(&'a self, ctx: CallContext, next: Next<'a>) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            if !ctx.request.is_hedge_eligible(&self.idempotency_header) {
                return next.run(ctx).await;
            }
            self.policy
                .run(&ctx, |branch| next.run(ctx.for_branch(branch)))
                .await
        })
    }
}

/// One retry loop per hedged branch.
#[derive(Debug)]
pub struct RetryLayer {
    policy: RetryPolicy,
    idempotency_header: String,
}

impl RetryLayer {
    pub fn new(policy: RetryPolicy, idempotency_header: impl Into<String>) -> Self {
        Self {
            policy,
            idempotency_header: idempotency_header.into(),
        }
    }
}

impl Middleware for RetryLayer {
    fn handle<'a>(&'a self, ctx: CallContext, next: Next<'a>) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let max_retries = self.policy.retries_for(&ctx, &self.idempotency_header);
            self.policy.run(&ctx, max_retries, |try_ctx| next.run(try_ctx)).await
        })
    }
}

/// Checks the cluster's breaker before each try and reports the try's outcome.
///
/// A try with no eligible destination never reaches the breaker.
#[derive(Debug, Default)]
pub struct CircuitBreakerLayer;

impl Middleware for CircuitBreakerLayer {
    fn handle<'a>(&'a self, ctx: CallContext, next: Next<'a>) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            if !ctx.cluster.pool.has_eligible() {
                return Err(GatewayError::NoHealthyDestination {
                    cluster: ctx.cluster.name.clone(),
                });
            }

            let permit = ctx.cluster.breaker.try_acquire()?;
            let result = next.run(ctx).await;
            match &result {
                Ok(_) => permit.record(Outcome::Success),
                // The destination answered; the buffer limit is ours.
                Err(GatewayError::ResponseTooLarge { .. }) => permit.record(Outcome::Success),
                Err(e) if e.is_destination_outcome() => permit.record(classify_error(e)),
                // Nothing was sent; the permit is released unrecorded.
                Err(_) => drop(permit),
            }
            result
        })
    }
}

/// Selects a destination, forwards, and classifies the response.
#[derive(Debug)]
pub struct ForwardStage {
    forwarder: Arc<dyn Forwarder>,
}

impl ForwardStage {
    pub fn new(forwarder: Arc<dyn Forwarder>) -> Self {
        Self { forwarder }
    }
}

fn check_status(response: UpstreamResponse) -> PipelineResult {
    match classify_status(response.status) {
        Outcome::Success => Ok(response),
        Outcome::RetryableFailure => Err(GatewayError::UpstreamFailure(Box::new(response))),
        Outcome::FatalFailure => Err(GatewayError::ClientFailure(Box::new(response))),
    }
}

impl Endpoint for ForwardStage {
    fn call<'a>(&'a self, ctx: CallContext) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let Some(destination) = ctx.cluster.pool.select() else {
                return Err(GatewayError::NoHealthyDestination {
                    cluster: ctx.cluster.name.clone(),
                });
            };

            let attempt = Attempt::start(&ctx, &destination.name);
            let result = self.forwarder.forward(&destination, &ctx.request).await;
            destination.record_transport_result(matches!(
                result,
                Err(GatewayError::TransportFailure { .. })
            ));

            let result = result.and_then(check_status);
            attempt.finish(ctx.correlation_id(), classify(&result));
            result
        })
    }
}

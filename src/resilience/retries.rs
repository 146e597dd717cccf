//! Retry logic.
//!
//! # Responsibilities
//! - Re-issue one logical attempt on retryable failures only
//! - Space tries with exponential backoff + jitter
//! - Stay inside the shared deadline budget
//!
//! # Design Decisions
//! - Fatal failures and gateway rejections (circuit open, no destination,
//!   deadline) return immediately; retrying them cannot help
//! - A retry whose backoff would not fit in the remaining budget is skipped
//!   and the last observed error is returned
//! - `idempotent_only` turns retries off for non-idempotent requests

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::GatewayError;
use crate::pipeline::context::{CallContext, UpstreamResponse};
use crate::pipeline::events::PipelineEvent;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::outcome::{classify_error, Outcome};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
    pub idempotent_only: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_ratio: config.jitter_ratio,
            idempotent_only: config.idempotent_only,
        }
    }

    /// Retries allowed for this request.
    pub fn retries_for(&self, ctx: &CallContext, idempotency_header: &str) -> u32 {
        if self.idempotent_only && !ctx.request.is_idempotent(idempotency_header) {
            0
        } else {
            self.max_retries
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        calculate_backoff(retry, self.base_delay, self.max_delay, self.jitter_ratio)
    }

    /// Run `attempt` once, then again on each retryable failure, at most
    /// `max_retries` more times.
    ///
    /// `attempt` receives the context for the try, numbered from 1.
    pub async fn run<F, Fut>(
        &self,
        ctx: &CallContext,
        max_retries: u32,
        mut attempt: F,
    ) -> Result<UpstreamResponse, GatewayError>
    where
        F: FnMut(CallContext) -> Fut,
        Fut: Future<Output = Result<UpstreamResponse, GatewayError>>,
    {
        let mut try_number = 1;
        loop {
            let error = match attempt(ctx.for_try(try_number)).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if classify_error(&error) != Outcome::RetryableFailure || try_number > max_retries {
                return Err(error);
            }

            let delay = self.delay_for(try_number);
            let remaining = ctx.remaining_budget();
            if delay >= remaining {
                ctx.events.publish(PipelineEvent::RetrySkipped {
                    request_id: ctx.correlation_id().to_string(),
                    cluster: ctx.cluster.name.clone(),
                    branch: ctx.branch,
                    attempt: try_number,
                    delay,
                    remaining,
                });
                return Err(error);
            }

            ctx.events.publish(PipelineEvent::RetryAttempted {
                request_id: ctx.correlation_id().to_string(),
                cluster: ctx.cluster.name.clone(),
                branch: ctx.branch,
                attempt: try_number,
                delay,
                error_kind: error.kind(),
            });

            tokio::time::sleep(delay).await;
            try_number += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectReason;
    use crate::resilience::deadline::Deadline;
    use crate::testing;
    use axum::http::{Method, StatusCode};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter_ratio: 0.2,
            idempotent_only: false,
        }
    }

    fn transport_error() -> GatewayError {
        GatewayError::TransportFailure {
            destination: "d1".into(),
            message: "connection refused".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let ctx = testing::call_context(Method::GET);
        let started = Arc::new(Mutex::new(Vec::new()));

        let result = policy(3)
            .run(&ctx, 3, |try_ctx| {
                let started = started.clone();
                async move {
                    started.lock().unwrap().push((try_ctx.try_number, Instant::now()));
                    if try_ctx.try_number < 3 {
                        Err(transport_error())
                    } else {
                        Ok(testing::response(StatusCode::OK))
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        let started = started.lock().unwrap();
        assert_eq!(started.len(), 3);

        let first_gap = started[1].1 - started[0].1;
        let second_gap = started[2].1 - started[1].1;
        assert!(first_gap >= Duration::from_millis(400), "{first_gap:?}");
        assert!(second_gap >= Duration::from_millis(800), "{second_gap:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let ctx = testing::call_context(Method::GET);
        let mut events = ctx.events.subscribe();
        let mut calls = 0;

        let result = policy(2)
            .run(&ctx, 2, |_| {
                calls += 1;
                async { Err(testing::upstream_failure(StatusCode::SERVICE_UNAVAILABLE)) }
            })
            .await;

        assert_eq!(calls, 3);
        assert_eq!(result.unwrap_err().kind(), "upstream_failure");

        let mut retried = 0;
        while let Ok(event) = events.try_recv() {
            if event.name() == "retry_attempted" {
                retried += 1;
            }
        }
        assert_eq!(retried, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failures_are_not_retried() {
        let ctx = testing::call_context(Method::GET);
        for error in [
            testing::client_failure(StatusCode::NOT_FOUND),
            GatewayError::CircuitOpen { cluster: "backend".into() },
            GatewayError::AdmissionRejected(RejectReason::QueueFull),
        ] {
            let mut calls = 0;
            let expected = error.kind();
            let result = policy(3)
                .run(&ctx, 3, |_| {
                    calls += 1;
                    let error = error.clone();
                    async move { Err(error) }
                })
                .await;
            assert_eq!(calls, 1, "{expected}");
            assert_eq!(result.unwrap_err().kind(), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_skipped_when_backoff_exceeds_budget() {
        let ctx = testing::call_context(Method::GET)
            .with_deadline(Deadline::start(Duration::from_millis(300)));
        let mut events = ctx.events.subscribe();
        let mut calls = 0;

        let result = policy(3)
            .run(&ctx, 3, |_| {
                calls += 1;
                async { Err(transport_error()) }
            })
            .await;

        assert_eq!(calls, 1);
        assert_eq!(result.unwrap_err().kind(), "transport_failure");
        assert_eq!(events.try_recv().unwrap().name(), "retry_skipped");
    }

    #[test]
    fn test_idempotent_only_disables_retries_for_post() {
        let mut policy = policy(3);
        policy.idempotent_only = true;

        let post = testing::call_context(Method::POST);
        let get = testing::call_context(Method::GET);
        assert_eq!(policy.retries_for(&post, "idempotency-key"), 0);
        assert_eq!(policy.retries_for(&get, "idempotency-key"), 3);

        policy.idempotent_only = false;
        assert_eq!(policy.retries_for(&post, "idempotency-key"), 3);
    }
}

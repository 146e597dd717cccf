//! Hedged requests.
//!
//! # Responsibilities
//! - Start the primary attempt; if it has not finished after the hedge
//!   delay, start another one concurrently
//! - Return the first success and drop every other attempt
//! - When every attempt fails, surface the most specific failure
//!
//! # Design Decisions
//! - Attempts are polled together in a `FuturesUnordered` on the caller's
//!   task; nothing is spawned, so dropping the hedged future (a winner was
//!   found, or the deadline fired) cancels every sibling and its transport
//!   call
//! - A retryable failure launches the next hedge right away instead of
//!   waiting out the delay
//! - Gateway rejections on a branch (circuit open, no destination) do not
//!   launch further hedges; the remaining branches run to completion

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures_util::future::{select, Either};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;

use crate::config::HedgingConfig;
use crate::error::GatewayError;
use crate::pipeline::context::{CallContext, UpstreamResponse};
use crate::pipeline::events::PipelineEvent;
use crate::resilience::outcome::{classify_error, Outcome};

#[derive(Debug, Clone)]
pub struct HedgingPolicy {
    pub delay: Duration,
    pub max_hedged_attempts: u32,
}

enum Polled<T> {
    Finished(Option<T>),
    DelayExpired,
}

impl HedgingPolicy {
    pub fn from_config(config: &HedgingConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms),
            max_hedged_attempts: if config.enabled {
                config.max_hedged_attempts
            } else {
                0
            },
        }
    }

    /// Race branch 0 against up to `max_hedged_attempts` delayed branches.
    ///
    /// `launch` is called with the branch index and returns that branch's
    /// future.
    pub async fn run<F, Fut>(&self, ctx: &CallContext, mut launch: F) -> Result<UpstreamResponse, GatewayError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<UpstreamResponse, GatewayError>>,
    {
        if self.max_hedged_attempts == 0 {
            return launch(0).await;
        }

        let mut in_flight = FuturesUnordered::new();
        in_flight.push(launch(0));

        let mut hedges_launched = 0u32;
        let mut candidate: Option<GatewayError> = None;
        // Measured from the most recent launch, not from the last finished branch.
        let mut delay = pin!(tokio::time::sleep(self.delay));

        loop {
            let can_hedge = hedges_launched < self.max_hedged_attempts;

            let polled = if can_hedge {
                match select(in_flight.next(), delay.as_mut()).await {
                    Either::Left((finished, _)) => Polled::Finished(finished),
                    Either::Right(((), _)) => Polled::DelayExpired,
                }
            } else {
                Polled::Finished(in_flight.next().await)
            };

            match polled {
                Polled::DelayExpired => {
                    hedges_launched += 1;
                    self.announce(ctx, hedges_launched);
                    in_flight.push(launch(hedges_launched));
                    delay.as_mut().reset(Instant::now() + self.delay);
                }
                Polled::Finished(Some(Ok(response))) => return Ok(response),
                Polled::Finished(Some(Err(error))) => {
                    // A definitive answer from a destination; another branch would get the same.
                    if matches!(
                        error,
                        GatewayError::ClientFailure(_) | GatewayError::ResponseTooLarge { .. }
                    ) {
                        return Err(error);
                    }

                    let retryable = classify_error(&error) == Outcome::RetryableFailure;
                    if candidate
                        .as_ref()
                        .map_or(true, |c| error.specificity() >= c.specificity())
                    {
                        candidate = Some(error);
                    }

                    if retryable && can_hedge {
                        hedges_launched += 1;
                        self.announce(ctx, hedges_launched);
                        in_flight.push(launch(hedges_launched));
                        delay.as_mut().reset(Instant::now() + self.delay);
                    }
                }
                Polled::Finished(None) => {
                    return Err(candidate.unwrap_or_else(|| GatewayError::NoHealthyDestination {
                        cluster: ctx.cluster.name.clone(),
                    }));
                }
            }
        }
    }

    fn announce(&self, ctx: &CallContext, hedge_index: u32) {
        tracing::debug!(
            request_id = %ctx.correlation_id(),
            cluster = %ctx.cluster.name,
            hedge_index,
            "Launching hedged attempt"
        );
        ctx.events.publish(PipelineEvent::HedgeTriggered {
            request_id: ctx.correlation_id().to_string(),
            cluster: ctx.cluster.name.clone(),
            hedge_index,
        });
    }
}

//! Circuit breaker for destination-group protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: cluster assumed down, requests fail fast
//! - Half-Open: testing if cluster recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: throughput >= minimum and failure ratio > threshold within window
//! Open → Half-Open: first call after the break duration
//! Half-Open → Closed: trial call succeeds (window reset)
//! Half-Open → Open: trial call fails (break restarts)
//! ```
//!
//! # Design Decisions
//! - Per-cluster circuit breaker, shared by every request and hedge branch
//! - Fail fast in Open state (no waiting for timeout)
//! - Single trial in Half-Open; a trial that is cancelled frees the slot
//! - Results that arrive for a state the circuit already left are ignored
//! - The ratio is evaluated when a failure is recorded; a success never opens
//!   the circuit

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::GatewayError;
use crate::pipeline::events::{EventBus, PipelineEvent};
use crate::resilience::outcome::Outcome;
use crate::resilience::window::{SampleWindow, Tally};

/// Externally visible circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
enum State {
    Closed,
    Open { opened_at: Instant, until: Instant },
    HalfOpen { trial_in_flight: bool },
}

#[derive(Debug)]
struct Inner {
    state: State,
    window: SampleWindow,
}

/// Point-in-time view for the admin API.
#[derive(Debug, Clone, Copy)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub window: Tally,
    /// Time since the circuit opened, when open.
    pub opened_for: Option<Duration>,
    /// Time left in the break, when open.
    pub open_remaining: Option<Duration>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    cluster: String,
    failure_ratio: f64,
    minimum_throughput: usize,
    break_duration: Duration,
    count_client_failures: bool,
    inner: Mutex<Inner>,
    events: EventBus,
}

impl CircuitBreaker {
    pub fn new(cluster: impl Into<String>, config: &CircuitBreakerConfig, events: EventBus) -> Self {
        Self {
            cluster: cluster.into(),
            failure_ratio: config.failure_ratio,
            minimum_throughput: config.minimum_throughput,
            break_duration: config.break_duration(),
            count_client_failures: config.count_client_failures,
            inner: Mutex::new(Inner {
                state: State::Closed,
                window: SampleWindow::new(config.sampling_duration(), config.window_capacity),
            }),
            events,
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask to send one call through the circuit.
    pub fn try_acquire(self: &Arc<Self>) -> Result<CircuitPermit, GatewayError> {
        let now = Instant::now();
        let mut half_opened = false;

        let decision = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            match inner.state {
                State::Closed => Ok(false),
                State::Open { until, .. } if now >= until => {
                    inner.state = State::HalfOpen { trial_in_flight: true };
                    half_opened = true;
                    Ok(true)
                }
                State::Open { .. } => Err(()),
                State::HalfOpen { trial_in_flight: false } => {
                    inner.state = State::HalfOpen { trial_in_flight: true };
                    Ok(true)
                }
                State::HalfOpen { trial_in_flight: true } => Err(()),
            }
        };

        if half_opened {
            self.events.publish(PipelineEvent::CircuitHalfOpened {
                cluster: self.cluster.clone(),
            });
        }

        match decision {
            Ok(trial) => Ok(CircuitPermit {
                breaker: Arc::clone(self),
                trial,
                settled: false,
            }),
            Err(()) => Err(GatewayError::CircuitOpen {
                cluster: self.cluster.clone(),
            }),
        }
    }

    fn is_failure(&self, outcome: Outcome) -> bool {
        match outcome {
            Outcome::Success => false,
            Outcome::RetryableFailure => true,
            Outcome::FatalFailure => self.count_client_failures,
        }
    }

    fn record(&self, trial: bool, outcome: Outcome) {
        let now = Instant::now();
        let failed = self.is_failure(outcome);

        let event = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            match inner.state {
                State::Closed if !trial => {
                    inner.window.record(now, failed);
                    let tally = inner.window.tally(now);
                    if failed
                        && tally.total >= self.minimum_throughput
                        && tally.failure_ratio() > self.failure_ratio
                    {
                        inner.state = State::Open {
                            opened_at: now,
                            until: now + self.break_duration,
                        };
                        Some(PipelineEvent::CircuitOpened {
                            cluster: self.cluster.clone(),
                            failures: tally.failures,
                            total: tally.total,
                        })
                    } else {
                        None
                    }
                }
                State::HalfOpen { .. } if trial => {
                    if failed {
                        inner.state = State::Open {
                            opened_at: now,
                            until: now + self.break_duration,
                        };
                        Some(PipelineEvent::CircuitReopened {
                            cluster: self.cluster.clone(),
                        })
                    } else {
                        inner.window.reset();
                        inner.state = State::Closed;
                        Some(PipelineEvent::CircuitClosed {
                            cluster: self.cluster.clone(),
                        })
                    }
                }
                // Stale result from a call admitted under a previous state.
                _ => None,
            }
        };

        if let Some(event) = event {
            self.events.publish(event);
        }
    }

    fn release_trial(&self) {
        let mut inner = self.lock();
        if let State::HalfOpen { trial_in_flight } = &mut inner.state {
            *trial_in_flight = false;
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.lock().state {
            State::Closed => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let window = inner.window.tally(now);
        let (state, opened_for, open_remaining) = match inner.state {
            State::Closed => (CircuitState::Closed, None, None),
            State::Open { opened_at, until } => (
                CircuitState::Open,
                Some(now.saturating_duration_since(opened_at)),
                Some(until.saturating_duration_since(now)),
            ),
            State::HalfOpen { .. } => (CircuitState::HalfOpen, None, None),
        };
        CircuitSnapshot {
            state,
            window,
            opened_for,
            open_remaining,
        }
    }
}

/// Permission to make one call through the circuit.
///
/// Report the result with [`CircuitPermit::record`]. A permit dropped without
/// a result (cancelled call, gateway-side rejection) records nothing; if it
/// was the half-open trial, the trial slot is freed for the next caller.
#[derive(Debug)]
pub struct CircuitPermit {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    settled: bool,
}

impl CircuitPermit {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.record(self.trial, outcome);
    }
}

impl Drop for CircuitPermit {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.release_trial();
        }
    }
}

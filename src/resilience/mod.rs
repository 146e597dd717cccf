//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → admission.rs (bounded permits + FIFO wait queue)
//!     → deadline.rs (one budget for the whole operation)
//!     → hedging.rs (race delayed branches, first success wins)
//!     → retries.rs (per branch, backoff.rs spacing, within the budget)
//!     → circuit_breaker.rs (per cluster, window.rs failure ratio)
//!     → forward to destination
//! Every result is mapped by outcome.rs before a strategy looks at it.
//! ```
//!
//! # Design Decisions
//! - Every strategy speaks the same failure taxonomy (`GatewayError`)
//! - Only retryable failures are retried or hedged
//! - Shared state (permits, circuit windows) is synchronized; per-request
//!   state lives in the request's own future
//! - The strategies are plain types; `pipeline::layers` adapts them to
//!   middleware

pub mod admission;
pub mod backoff;
pub mod circuit_breaker;
pub mod deadline;
pub mod hedging;
pub mod outcome;
pub mod retries;
pub mod window;

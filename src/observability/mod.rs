//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handling and health probing produce:
//!     → tracing spans/events (structured logs, request id on every line)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Resilience strategies produce:
//!     → PipelineEvent on the event bus
//!     → logging.rs consumer (log line + event counter)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

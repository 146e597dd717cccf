//! Resilient forwarding gateway.
//!
//! Routes client requests to clusters of backend destinations through a
//! composed resilience pipeline: admission control, an overall deadline,
//! hedging, retries with backoff and a per-cluster circuit breaker, fed by
//! health-aware destination selection.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ routing ──▶ pipeline ─────────────────────┐
//!                                              │ admission                   │
//!                                              │ deadline                    │
//!                                              │ destination gate            │
//!                                              │ hedging ─┬─ retry ─ breaker │
//!                                              │          └─ retry ─ breaker │
//!                                              ▼                             │
//!                                     load_balancer (eligible only) ──▶ http::forwarder ──▶ Destination
//!                                              ▲
//!                        health (active probes + passive transport window)
//!
//!     Cross-cutting: config, observability (logs, metrics, event bus),
//!                    lifecycle (signals, shutdown), admin API
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod routing;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

#[cfg(test)]
pub(crate) mod testing;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{EventBus, Pipeline};

//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! RequestContext (buffered, immutable)
//!     → orchestrator.rs (build CallContext, start the chain)
//!     → middleware.rs (Next continuation)
//!     → layers.rs:
//!         AdmissionLayer → DeadlineLayer → DestinationGate
//!         → HedgingLayer → RetryLayer → CircuitBreakerLayer
//!         → ForwardStage (select destination, Forwarder call)
//!     → PipelineResult (response or GatewayError)
//!
//! Every layer publishes state changes on events.rs
//! ```
//!
//! # Design Decisions
//! - Ordering is an explicit list, visible in `Pipeline::standard`
//! - Layers run on the request's own task; nothing is spawned, so
//!   cancellation propagates by dropping futures
//! - Events are fire-and-forget; no layer waits on an observer

pub mod context;
pub mod events;
pub mod layers;
pub mod middleware;
pub mod orchestrator;

pub use context::{CallContext, RequestContext, UpstreamResponse};
pub use events::{EventBus, PipelineEvent};
pub use middleware::{Endpoint, Middleware, Next, PipelineResult};
pub use orchestrator::Pipeline;

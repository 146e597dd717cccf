//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, trace, body limit)
//!     → routing (prefix → cluster)
//!     → request.rs (buffer body, build RequestContext)
//!     → pipeline (resilience layers)
//!         → forwarder.rs (one outbound call per attempt)
//!     → response.rs (relay or map error, add handled-by header)
//!     → Send to client
//! ```

pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;

pub use forwarder::{Forwarder, HttpForwarder};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError};

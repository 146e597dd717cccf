//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (longest matching path prefix)
//!     → Return: matched Route (cluster + forwarded path) or NoMatch
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Normalize prefixes
//!     → Sort by prefix length, longest first
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Prefixes match whole path segments: `/api` matches `/api/x`, not `/apix`
//! - The prefix is removed before forwarding; the query string is kept

pub mod router;

pub use router::{Route, Router};

//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each destination's health path
//!     → Update state.rs
//!
//! Passive health checks (passive.rs):
//!     Transport result of each forwarded attempt
//!     → Rolling failure-rate window
//!     → Exclude for the reactivation period when the rate is exceeded
//!
//! State machine (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary; either one can exclude
//! - Unknown (never probed) destinations are eligible
//! - Health state is per-destination, not per-cluster

pub mod active;
pub mod passive;
pub mod state;

pub use active::HealthMonitor;
pub use state::HealthState;

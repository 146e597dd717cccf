//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to subsystems at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no dynamic reconfiguration
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AdmissionConfig, CircuitBreakerConfig, DestinationConfig, GatewayConfig,
    HealthCheckConfig, HedgingConfig, ListenerConfig, LoadBalancingConfig, LoadBalancingStrategy, LogFormat,
    ObservabilityConfig, PassiveHealthConfig, ProxyConfig, RetryConfig, RouteConfig, TimeoutConfig,
};

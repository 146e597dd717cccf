//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Inbound proxy surface settings.
    pub proxy: ProxyConfig,

    /// Route definitions mapping path prefixes to clusters.
    pub routes: Vec<RouteConfig>,

    /// Destination definitions.
    pub destinations: Vec<DestinationConfig>,

    /// Destination selection strategy.
    pub load_balancing: LoadBalancingConfig,

    /// Admission control (concurrency gate).
    pub admission: AdmissionConfig,

    /// Overall deadline configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Hedging configuration.
    pub hedging: HedgingConfig,

    /// Active health check settings.
    pub health_check: HealthCheckConfig,

    /// Passive health settings.
    pub passive_health: PassiveHealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            proxy: ProxyConfig::default(),
            routes: vec![RouteConfig {
                name: "default".to_string(),
                path_prefix: "/proxy".to_string(),
                cluster: "backend".to_string(),
            }],
            destinations: Vec::new(),
            load_balancing: LoadBalancingConfig::default(),
            admission: AdmissionConfig::default(),
            timeouts: TimeoutConfig::default(),
            retries: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            hedging: HedgingConfig::default(),
            health_check: HealthCheckConfig::default(),
            passive_health: PassiveHealthConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Inbound proxy surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Value of the header identifying the gateway on responses.
    pub gateway_name: String,

    /// Name of the header injected on every response.
    pub handled_by_header: String,

    /// Maximum buffered size of request and response bodies.
    pub max_body_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            gateway_name: "resilient-gateway".to_string(),
            handled_by_header: "x-handled-by".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Route configuration mapping a path prefix to a cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match. Stripped before forwarding.
    pub path_prefix: String,

    /// Cluster (destination group) to forward to.
    pub cluster: String,
}

/// Destination configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationConfig {
    /// Unique destination identifier.
    pub name: String,

    /// Cluster this destination belongs to.
    pub cluster: String,

    /// Base URL (e.g., "http://127.0.0.1:5001").
    pub address: String,
}

/// Destination selection strategy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingStrategy {
    #[default]
    RoundRobin,
    Random,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadBalancingConfig {
    pub strategy: LoadBalancingStrategy,
}

/// Admission control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum concurrent operations.
    pub permit_limit: usize,

    /// Maximum callers waiting for a permit.
    pub queue_limit: usize,

    /// How long a queued caller waits before giving up, in milliseconds.
    pub queue_timeout_ms: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            permit_limit: 100,
            queue_limit: 50,
            queue_timeout_ms: 10_000,
        }
    }
}

impl AdmissionConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Budget for one logical operation, all retries and hedges included.
    pub overall_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { overall_ms: 30_000 }
    }
}

impl TimeoutConfig {
    pub fn overall(&self) -> Duration {
        Duration::from_millis(self.overall_ms)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first try.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Multiplicative jitter: the delay is scaled by a factor drawn
    /// uniformly from `[1 - jitter_ratio, 1 + jitter_ratio]`.
    pub jitter_ratio: f64,

    /// Never retry requests that are not idempotent.
    pub idempotent_only: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter_ratio: 0.2,
            idempotent_only: false,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure ratio that must be exceeded to open the circuit.
    pub failure_ratio: f64,

    /// Minimum recorded outcomes in the window before the ratio is evaluated.
    pub minimum_throughput: usize,

    /// Length of the rolling sample window in milliseconds.
    pub sampling_duration_ms: u64,

    /// How long the circuit stays open in milliseconds.
    pub break_duration_ms: u64,

    /// Capacity of the sample ring buffer.
    pub window_capacity: usize,

    /// Count client failures (4xx) as failures.
    pub count_client_failures: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_ratio: 0.5,
            minimum_throughput: 3,
            sampling_duration_ms: 10_000,
            break_duration_ms: 30_000,
            window_capacity: 1024,
            count_client_failures: true,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn sampling_duration(&self) -> Duration {
        Duration::from_millis(self.sampling_duration_ms)
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_millis(self.break_duration_ms)
    }
}

/// Hedging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HedgingConfig {
    /// Enable hedging for eligible requests.
    pub enabled: bool,

    /// Delay before each hedged attempt in milliseconds.
    pub delay_ms: u64,

    /// Maximum number of additional attempts.
    pub max_hedged_attempts: u32,

    /// Request header that marks a non-read request as idempotent.
    pub idempotency_header: String,
}

impl Default for HedgingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 250,
            max_hedged_attempts: 1,
            idempotency_header: "idempotency-key".to_string(),
        }
    }
}

/// Active health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Passive health configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PassiveHealthConfig {
    /// Enable passive health tracking.
    pub enabled: bool,

    /// Transport failure rate that must be exceeded to exclude a destination.
    pub failure_rate_threshold: f64,

    /// Minimum observed requests in the window before the rate is evaluated.
    pub minimum_requests: usize,

    /// Trailing window length in seconds.
    pub window_secs: u64,

    /// How long an excluded destination stays out of selection.
    pub reactivation_secs: u64,

    /// Capacity of the sample ring buffer.
    pub window_capacity: usize,
}

impl Default for PassiveHealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_rate_threshold: 0.3,
            minimum_requests: 10,
            window_secs: 60,
            reactivation_secs: 30,
            window_capacity: 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Capacity of the pipeline event channel.
    pub event_buffer: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            event_buffer: 1024,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

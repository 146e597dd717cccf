//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference clusters with destinations)
//! - Validate value ranges (limits > 0, ratios in (0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} must be within (0, 1], got {value}")]
    RatioOutOfRange { field: &'static str, value: f64 },

    #[error("duplicate destination name '{0}'")]
    DuplicateDestination(String),

    #[error("destination '{name}' has invalid address '{address}'")]
    InvalidAddress { name: String, address: String },

    #[error("route '{route}' references cluster '{cluster}' which has no destinations")]
    UnknownCluster { route: String, cluster: String },

    #[error("route '{0}' path prefix must start with '/'")]
    InvalidPrefix(String),

    #[error("{field} is not a valid HTTP header {kind}: '{value}'")]
    InvalidHeader {
        field: &'static str,
        kind: &'static str,
        value: String,
    },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive: [(&'static str, u64); 11] = [
        ("admission.permit_limit", config.admission.permit_limit as u64),
        ("admission.queue_timeout_ms", config.admission.queue_timeout_ms),
        ("timeouts.overall_ms", config.timeouts.overall_ms),
        ("retries.base_delay_ms", config.retries.base_delay_ms),
        ("circuit_breaker.minimum_throughput", config.circuit_breaker.minimum_throughput as u64),
        ("circuit_breaker.sampling_duration_ms", config.circuit_breaker.sampling_duration_ms),
        ("circuit_breaker.break_duration_ms", config.circuit_breaker.break_duration_ms),
        ("circuit_breaker.window_capacity", config.circuit_breaker.window_capacity as u64),
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("passive_health.window_capacity", config.passive_health.window_capacity as u64),
        ("observability.event_buffer", config.observability.event_buffer as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }

    let ratios = [
        ("circuit_breaker.failure_ratio", config.circuit_breaker.failure_ratio),
        ("passive_health.failure_rate_threshold", config.passive_health.failure_rate_threshold),
    ];
    for (field, value) in ratios {
        if !(value > 0.0 && value <= 1.0) {
            errors.push(ValidationError::RatioOutOfRange { field, value });
        }
    }
    if !(0.0..1.0).contains(&config.retries.jitter_ratio) {
        errors.push(ValidationError::RatioOutOfRange {
            field: "retries.jitter_ratio",
            value: config.retries.jitter_ratio,
        });
    }

    if HeaderName::from_bytes(config.proxy.handled_by_header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeader {
            field: "proxy.handled_by_header",
            kind: "name",
            value: config.proxy.handled_by_header.clone(),
        });
    }
    if HeaderValue::from_str(&config.proxy.gateway_name).is_err() {
        errors.push(ValidationError::InvalidHeader {
            field: "proxy.gateway_name",
            kind: "value",
            value: config.proxy.gateway_name.clone(),
        });
    }

    let mut names = HashSet::new();
    let mut clusters = HashSet::new();
    for dest in &config.destinations {
        if !names.insert(dest.name.as_str()) {
            errors.push(ValidationError::DuplicateDestination(dest.name.clone()));
        }
        let valid = Url::parse(&dest.address)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidAddress {
                name: dest.name.clone(),
                address: dest.address.clone(),
            });
        }
        clusters.insert(dest.cluster.as_str());
    }

    for route in &config.routes {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix(route.name.clone()));
        }
        if !clusters.contains(route.cluster.as_str()) {
            errors.push(ValidationError::UnknownCluster {
                route: route.name.clone(),
                cluster: route.cluster.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DestinationConfig;

    fn valid_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.destinations.push(DestinationConfig {
            name: "d1".into(),
            cluster: "backend".into(),
            address: "http://127.0.0.1:5001".into(),
        });
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid_config();
        config.admission.permit_limit = 0;
        config.circuit_breaker.failure_ratio = 1.5;
        config.destinations.push(DestinationConfig {
            name: "d1".into(),
            cluster: "backend".into(),
            address: "not a url".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::DuplicateDestination("d1".into())));
    }

    #[test]
    fn test_route_without_destinations() {
        let errors = validate_config(&GatewayConfig::default()).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnknownCluster {
                route: "default".into(),
                cluster: "backend".into(),
            }]
        );
    }

    #[test]
    fn test_handled_by_header_must_be_valid() {
        let mut config = valid_config();
        config.proxy.handled_by_header = "bad header".into();
        config.proxy.gateway_name = "line\nbreak".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0],
            ValidationError::InvalidHeader { field: "proxy.handled_by_header", .. }
        ));
    }
}

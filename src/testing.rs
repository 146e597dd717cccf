//! Shared fixtures for unit tests.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};

use crate::config::{
    CircuitBreakerConfig, DestinationConfig, HealthCheckConfig, PassiveHealthConfig,
};
use crate::error::GatewayError;
use crate::load_balancer::destination::Destination;
use crate::load_balancer::pool::{Cluster, DestinationPool};
use crate::load_balancer::round_robin::RoundRobin;
use crate::pipeline::context::{CallContext, RequestContext, UpstreamResponse};
use crate::pipeline::events::EventBus;
use crate::resilience::circuit_breaker::CircuitBreaker;

pub fn destination(name: &str) -> Arc<Destination> {
    destination_on(name, EventBus::default())
}

pub fn destination_on(name: &str, events: EventBus) -> Arc<Destination> {
    let config = DestinationConfig {
        name: name.into(),
        cluster: "backend".into(),
        address: format!("http://{name}.invalid:8080"),
    };
    Arc::new(
        Destination::new(
            &config,
            &HealthCheckConfig::default(),
            &PassiveHealthConfig::default(),
            events,
        )
        .unwrap(),
    )
}

/// Cluster "backend" with the given destinations, round robin.
pub fn cluster(names: &[&str], breaker: &CircuitBreakerConfig, events: &EventBus) -> Arc<Cluster> {
    let destinations = names.iter().map(|n| destination_on(n, events.clone())).collect();
    Arc::new(Cluster {
        name: "backend".into(),
        pool: DestinationPool::new(destinations, Box::new(RoundRobin::new())),
        breaker: Arc::new(CircuitBreaker::new("backend", breaker, events.clone())),
    })
}

pub fn request(method: Method) -> RequestContext {
    RequestContext::new(method, "/items", HeaderMap::new(), Bytes::new(), "req-1")
}

/// Context for request "req-1" against a one-destination "backend" cluster.
pub fn call_context(method: Method) -> CallContext {
    let events = EventBus::default();
    let cluster = cluster(&["d1"], &CircuitBreakerConfig::default(), &events);
    CallContext::new(Arc::new(request(method)), cluster, events)
}

pub fn response_from(destination: &str, status: StatusCode) -> UpstreamResponse {
    UpstreamResponse {
        destination: destination.into(),
        status,
        headers: HeaderMap::new(),
        body: Bytes::from_static(b"ok"),
    }
}

pub fn response(status: StatusCode) -> UpstreamResponse {
    response_from("d1", status)
}

pub fn upstream_failure(status: StatusCode) -> GatewayError {
    GatewayError::UpstreamFailure(Box::new(response(status)))
}

pub fn client_failure(status: StatusCode) -> GatewayError {
    GatewayError::ClientFailure(Box::new(response(status)))
}

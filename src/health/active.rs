//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every destination's health path
//! - Feed results into each destination's active state machine
//! - Stop on the shutdown broadcast
//!
//! # Design Decisions
//! - All destinations of a round are probed concurrently, each bounded by
//!   the probe timeout, so one hung destination cannot delay the others
//! - Only 2xx counts as healthy

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request};
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::load_balancer::destination::Destination;
use crate::load_balancer::pool::ClusterManager;
use crate::observability::metrics;

const USER_AGENT: &str = concat!("resilient-gateway-health-check/", env!("CARGO_PKG_VERSION"));

#[derive(Debug)]
pub struct HealthMonitor {
    clusters: Arc<ClusterManager>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(clusters: Arc<ClusterManager>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            clusters,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every destination once.
    pub async fn probe_all(&self) {
        let destinations = self.clusters.all_destinations();
        join_all(destinations.iter().map(|d| self.check(d))).await;
    }

    async fn check(&self, destination: &Destination) {
        let healthy = self.probe(destination).await;
        destination.record_probe(healthy);
        metrics::record_destination_health(&destination.name, destination.is_eligible());
    }

    async fn probe(&self, destination: &Destination) -> bool {
        let url = destination.url_for(&self.config.path);
        let request = match Request::builder()
            .method(Method::GET)
            .uri(&url)
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(destination = %destination.name, url = %url, error = %e, "Failed to build health check request");
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(destination = %destination.name, status = %response.status(), "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(destination = %destination.name, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(destination = %destination.name, "Health check failed: timeout");
                false
            }
        }
    }
}

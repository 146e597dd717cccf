//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, handled-by header)
//! - Dispatch proxied requests to the routing table and the pipeline
//! - Start the active health monitor alongside the listener
//! - Drain in-flight requests on shutdown

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::map_response_with_state,
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::admin;
use crate::config::GatewayConfig;
use crate::health::active::HealthMonitor;
use crate::http::forwarder::{Forwarder, HttpForwarder};
use crate::http::request::{into_context, propagate_request_id_layer, set_request_id_layer};
use crate::http::response::{error_response, inject_handled_by, into_response, HandledBy};
use crate::lifecycle::Shutdown;
use crate::load_balancer::pool::ClusterManager;
use crate::observability::metrics;
use crate::pipeline::{EventBus, Pipeline};
use crate::routing::Router as RouteTable;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid destination address: {0}")]
    Destination(#[from] url::ParseError),

    #[error("invalid handled-by header: {0}")]
    Header(#[from] axum::http::Error),
}

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub clusters: Arc<ClusterManager>,
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<GatewayConfig>,
    pub started_at: Instant,
}

/// HTTP server for the gateway.
#[derive(Debug)]
pub struct HttpServer {
    app: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server forwarding with the pooled hyper client.
    pub fn new(config: GatewayConfig, events: EventBus) -> Result<Self, ServerError> {
        let forwarder = Arc::new(HttpForwarder::new(config.proxy.max_body_bytes));
        Self::with_forwarder(config, events, forwarder)
    }

    pub fn with_forwarder(
        config: GatewayConfig,
        events: EventBus,
        forwarder: Arc<dyn Forwarder>,
    ) -> Result<Self, ServerError> {
        let clusters = Arc::new(ClusterManager::from_config(&config, &events)?);
        let pipeline = Arc::new(Pipeline::standard(&config, forwarder, events));
        let handled_by = HandledBy::new(&config.proxy.handled_by_header, &config.proxy.gateway_name)?;

        let state = AppState {
            routes: Arc::new(RouteTable::from_config(&config.routes)),
            clusters,
            pipeline,
            config: Arc::new(config),
            started_at: Instant::now(),
        };

        let app = Self::build_router(state.clone(), handled_by);
        Ok(Self { app, state })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState, handled_by: HandledBy) -> Router {
        let mut router = Router::new().route("/health", get(liveness));
        if state.config.admin.enabled {
            router = router.merge(admin::router(state.clone()));
        }

        router
            .fallback(proxy_handler)
            .layer(RequestBodyLimitLayer::new(state.config.proxy.max_body_bytes))
            .with_state(state)
            .layer(map_response_with_state(handled_by, inject_handled_by))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The router, for serving in-process (tests, embedding).
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.state.routes.routes().len(),
            clusters = self.state.clusters.clusters().count(),
            "HTTP server starting"
        );

        let health_check = &self.state.config.health_check;
        if health_check.enabled {
            let monitor = HealthMonitor::new(self.state.clusters.clone(), health_check.clone());
            let stop = shutdown.subscribe();
            tokio::spawn(async move {
                monitor.run(stop).await;
            });
        }

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Process liveness; says nothing about destinations.
async fn liveness(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

/// Main proxy handler.
/// Looks up the route and runs the request through the pipeline.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(route) = state.routes.match_path(&path) else {
        tracing::debug!(method = %method, path = %path, "No route matched");
        metrics::record_request(method.as_str(), 404, "none", started.elapsed());
        return error_response(
            StatusCode::NOT_FOUND,
            "no_route",
            format!("no route matches '{path}'"),
        );
    };
    let cluster_name = route.cluster.clone();

    let Some(cluster) = state.clusters.get(&cluster_name) else {
        tracing::error!(route = %route.name, cluster = %cluster_name, "Route references unknown cluster");
        metrics::record_request(method.as_str(), 503, &cluster_name, started.elapsed());
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "no_healthy_destination",
            format!("cluster '{cluster_name}' has no destinations"),
        );
    };

    let forward_path = route.forward_path(request.uri());
    let ctx = match into_context(request, forward_path, state.config.proxy.max_body_bytes).await {
        Ok(ctx) => ctx,
        Err(e) => {
            metrics::record_request(method.as_str(), 413, &cluster_name, started.elapsed());
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", e.to_string());
        }
    };
    let request_id = ctx.correlation_id.clone();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        cluster = %cluster_name,
        "Proxying request"
    );

    let result = state.pipeline.execute(cluster, Arc::new(ctx)).await;
    let outcome = match &result {
        Ok(upstream) => upstream.destination.clone(),
        Err(e) => e.kind().to_string(),
    };
    let response = into_response(result);
    let elapsed = started.elapsed();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        outcome = %outcome,
        elapsed_ms = elapsed.as_millis() as u64,
        "Request completed"
    );
    metrics::record_request(method.as_str(), response.status().as_u16(), &cluster_name, elapsed);

    response
}

//! Shared utilities for integration and load testing.
//!
//! `TestBackend` is a configurable destination: it serves `/health`, a
//! control surface at `GET/POST /api/configure`, and answers every other
//! path according to its current mode (paths under `/missing` always 404).

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use resilient_gateway::config::{DestinationConfig, GatewayConfig};
use resilient_gateway::{EventBus, HttpServer, Shutdown};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Healthy,
    /// Every request and health probe answers 500.
    Error,
    /// Requests answer 200 after `delay_ms`.
    Delay,
    /// The next `fail_count` requests answer 500, then 200.
    FailThenSucceed,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BackendSettings {
    pub mode: Mode,
    pub delay_ms: u64,
    pub fail_count: usize,
}

#[derive(Debug, Default)]
struct BackendState {
    name: String,
    settings: Mutex<BackendSettings>,
    failures_served: AtomicUsize,
    hits: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct TestBackend {
    pub addr: SocketAddr,
    state: Arc<BackendState>,
}

impl TestBackend {
    pub async fn start(name: &str) -> Self {
        Self::start_with(name, BackendSettings::default()).await
    }

    pub async fn start_with(name: &str, settings: BackendSettings) -> Self {
        let state = Arc::new(BackendState {
            name: name.to_string(),
            settings: Mutex::new(settings),
            ..BackendState::default()
        });

        let app = Router::new()
            .route("/health", get(health))
            .route("/api/configure", get(get_settings).post(set_settings))
            .fallback(serve)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Change the mode through the backend's own control surface.
    pub async fn configure(&self, settings: BackendSettings) {
        let response = reqwest::Client::new()
            .post(format!("{}/api/configure", self.url()))
            .json(&settings)
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    /// Requests served, health probes excluded.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

async fn health(State(state): State<Arc<BackendState>>) -> StatusCode {
    let mode = state.settings.lock().unwrap().mode;
    if mode == Mode::Error {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn get_settings(State(state): State<Arc<BackendState>>) -> Json<BackendSettings> {
    Json(state.settings.lock().unwrap().clone())
}

async fn set_settings(
    State(state): State<Arc<BackendState>>,
    Json(settings): Json<BackendSettings>,
) -> StatusCode {
    *state.settings.lock().unwrap() = settings;
    state.failures_served.store(0, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

struct InFlight(Arc<BackendState>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn serve(State(state): State<Arc<BackendState>>, uri: Uri, headers: HeaderMap) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(current, Ordering::SeqCst);
    let _in_flight = InFlight(state.clone());

    let settings = state.settings.lock().unwrap().clone();
    let status = match settings.mode {
        _ if uri.path().starts_with("/missing") => StatusCode::NOT_FOUND,
        Mode::Healthy => StatusCode::OK,
        Mode::Error => StatusCode::INTERNAL_SERVER_ERROR,
        Mode::Delay => {
            tokio::time::sleep(Duration::from_millis(settings.delay_ms)).await;
            StatusCode::OK
        }
        Mode::FailThenSucceed => {
            if state.failures_served.fetch_add(1, Ordering::SeqCst) < settings.fail_count {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            }
        }
    };

    let mut response = (status, state.name.clone()).into_response();
    let echoed = response.headers_mut();
    if let Ok(path) = HeaderValue::from_str(&uri.to_string()) {
        echoed.insert("x-seen-path", path);
    }
    if let Some(id) = headers.get("x-request-id") {
        echoed.insert("x-seen-request-id", id.clone());
    }
    response
}

/// Gateway config with route `/proxy` → cluster `backend` over `backends`.
///
/// Active probing is off and backoff is short; tests turn on what they need.
pub fn gateway_config(backends: &[&TestBackend]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_enabled = false;
    config.health_check.enabled = false;
    config.retries.base_delay_ms = 20;
    config.retries.max_delay_ms = 200;
    for backend in backends {
        config.destinations.push(DestinationConfig {
            name: backend.state.name.clone(),
            cluster: "backend".into(),
            address: backend.url(),
        });
    }
    config
}

/// A running gateway. Shuts down when dropped.
pub struct TestGateway {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestGateway {
    pub async fn start(config: GatewayConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::new(config, EventBus::default()).unwrap();

        let shutdown = Shutdown::new();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            let _ = server.run(listener, stop).await;
        });

        Self { addr, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

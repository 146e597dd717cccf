use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub admission: AdmissionStatus,
}

#[derive(Debug, Serialize)]
pub struct AdmissionStatus {
    pub permit_limit: usize,
    pub in_flight: usize,
    pub queued: usize,
}

#[derive(Debug, Serialize)]
pub struct DestinationStatus {
    pub name: String,
    pub cluster: String,
    pub address: String,
    pub active_state: &'static str,
    pub passive_excluded: bool,
    pub excluded_for_ms: Option<u64>,
    pub eligible: bool,
    pub last_probe_age_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CircuitStatus {
    pub cluster: String,
    pub state: &'static str,
    pub window_total: usize,
    pub window_failures: usize,
    pub opened_for_ms: Option<u64>,
    pub open_remaining_ms: Option<u64>,
}

fn millis(d: std::time::Duration) -> u64 {
    d.as_millis() as u64
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let admission = state.pipeline.admission();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        admission: AdmissionStatus {
            permit_limit: admission.permit_limit(),
            in_flight: admission.in_flight(),
            queued: admission.queued(),
        },
    })
}

pub async fn get_destinations(State(state): State<AppState>) -> Json<Vec<DestinationStatus>> {
    let statuses = state
        .clusters
        .all_destinations()
        .iter()
        .map(|d| {
            let excluded_for = d.passive_exclusion();
            DestinationStatus {
                name: d.name.clone(),
                cluster: d.cluster.clone(),
                address: d.base_url.to_string(),
                active_state: d.active_state().as_str(),
                passive_excluded: excluded_for.is_some(),
                excluded_for_ms: excluded_for.map(millis),
                eligible: d.is_eligible(),
                last_probe_age_ms: d.last_probe_age().map(millis),
            }
        })
        .collect();

    Json(statuses)
}

pub async fn get_circuits(State(state): State<AppState>) -> Json<Vec<CircuitStatus>> {
    let circuits = state
        .clusters
        .clusters()
        .map(|cluster| {
            let snapshot = cluster.breaker.snapshot();
            CircuitStatus {
                cluster: cluster.name.clone(),
                state: snapshot.state.as_str(),
                window_total: snapshot.window.total,
                window_failures: snapshot.window.failures,
                opened_for_ms: snapshot.opened_for.map(millis),
                open_remaining_ms: snapshot.open_remaining.map(millis),
            }
        })
        .collect();

    Json(circuits)
}

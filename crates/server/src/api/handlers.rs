use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use remediator_core::SanitizedConfig;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Orchestrator status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Ticket count per state
    pub tickets_by_state: BTreeMap<String, usize>,
    pub total_tickets: usize,
    /// Jobs currently being polled
    pub active_jobs: usize,
    pub issue_source_configured: bool,
    pub agent_configured: bool,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = state.orchestrator().status().await;
    Json(StatusResponse {
        tickets_by_state: status.tickets_by_state,
        total_tickets: status.total_tickets,
        active_jobs: status.active_jobs,
        issue_source_configured: state.config().issue_source.is_some(),
        agent_configured: state.config().agent.is_some(),
    })
}

/// Prometheus scrape endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

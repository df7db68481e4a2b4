//! Ticket API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use remediator_core::{Analysis, Job, OrchestratorError, ScopeOutcome, Ticket, TicketStatus};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    /// Filter by state type
    pub state: Option<String>,
}

/// Response for ticket operations
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub number: u64,
    pub external_id: String,
    pub title: String,
    pub body: Option<String>,
    pub labels: BTreeSet<String>,
    pub url: String,
    /// State type, e.g. "scoped"
    pub state: &'static str,
    pub status: TicketStatus,
    /// True when the last job failed and the ticket fell back to scoped
    pub failed: bool,
    pub analysis: Option<Analysis>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            number: ticket.number,
            external_id: ticket.external_id,
            title: ticket.title,
            body: ticket.body,
            labels: ticket.labels,
            url: ticket.url,
            state: ticket.status.state_type(),
            failed: ticket.status.is_failed(),
            status: ticket.status,
            analysis: ticket.analysis,
            created_at: ticket.created_at.to_rfc3339(),
            updated_at: ticket.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<TicketResponse>,
    pub total: usize,
}

/// Response for starting a job
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub job_id: String,
    pub status: String,
}

/// Acknowledgement for cancel and complete
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TicketErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<TicketErrorResponse>);

fn error_response(err: OrchestratorError) -> ApiError {
    let status = match &err {
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::InvalidTransition { .. } | OrchestratorError::Conflict { .. } => {
            StatusCode::CONFLICT
        }
        OrchestratorError::AgentUnavailable(_)
        | OrchestratorError::AgentReportedFailure { .. }
        | OrchestratorError::IssueSource(_) => StatusCode::BAD_GATEWAY,
        OrchestratorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(TicketErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// List tickets, syncing from the issue source first
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Json<ListTicketsResponse> {
    let tickets: Vec<TicketResponse> = state
        .orchestrator()
        .list_tickets()
        .await
        .into_iter()
        .filter(|t| {
            params
                .state
                .as_deref()
                .is_none_or(|wanted| t.status.state_type() == wanted)
        })
        .map(TicketResponse::from)
        .collect();

    let total = tickets.len();
    Json(ListTicketsResponse { tickets, total })
}

/// Get a ticket by number
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(number): Path<u64>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket = state
        .orchestrator()
        .get_ticket(number)
        .await
        .map_err(error_response)?;
    Ok(Json(TicketResponse::from(ticket)))
}

/// Produce (or return the cached) analysis for a ticket
pub async fn scope_ticket(
    State(state): State<Arc<AppState>>,
    Path(number): Path<u64>,
) -> Result<Json<ScopeOutcome>, ApiError> {
    let outcome = state
        .orchestrator()
        .scope(number)
        .await
        .map_err(error_response)?;
    Ok(Json(outcome))
}

/// Replace the analysis of a scoped ticket
pub async fn regenerate_scope(
    State(state): State<Arc<AppState>>,
    Path(number): Path<u64>,
) -> Result<Json<ScopeOutcome>, ApiError> {
    let outcome = state
        .orchestrator()
        .regenerate_scope(number)
        .await
        .map_err(error_response)?;
    Ok(Json(outcome))
}

/// Start a remediation job
pub async fn execute_ticket(
    State(state): State<Arc<AppState>>,
    Path(number): Path<u64>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let job = state
        .orchestrator()
        .execute(number)
        .await
        .map_err(error_response)?;
    Ok(Json(ExecuteResponse {
        job_id: job.id,
        status: "started".to_string(),
    }))
}

/// Cancel the running job
pub async fn cancel_ticket(
    State(state): State<Arc<AppState>>,
    Path(number): Path<u64>,
) -> Result<Json<StatusMessage>, ApiError> {
    state
        .orchestrator()
        .cancel(number)
        .await
        .map_err(error_response)?;
    Ok(Json(StatusMessage {
        status: "cancelled".to_string(),
    }))
}

/// Accept a ticket in review
pub async fn complete_ticket(
    State(state): State<Arc<AppState>>,
    Path(number): Path<u64>,
) -> Result<Json<StatusMessage>, ApiError> {
    state
        .orchestrator()
        .complete(number)
        .await
        .map_err(error_response)?;
    Ok(Json(StatusMessage {
        status: "complete".to_string(),
    }))
}

/// Latest job snapshot for a ticket
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(number): Path<u64>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .orchestrator()
        .job_status(number)
        .await
        .map_err(error_response)?;
    Ok(Json(job))
}

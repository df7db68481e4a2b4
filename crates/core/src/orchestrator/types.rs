//! Types for the remediation orchestrator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::AgentError;
use crate::issue_source::IssueSourceError;
use crate::scoring::Analysis;
use crate::ticket::{StoreError, TransitionError};

/// Errors returned by orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Ticket or job not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not legal from the ticket's current status.
    #[error("cannot {requested} ticket #{ticket} in state {current}")]
    InvalidTransition {
        ticket: u64,
        current: String,
        requested: String,
    },

    /// The ticket already has an active job.
    #[error("ticket #{ticket} already has an active job ({active_job})")]
    Conflict { ticket: u64, active_job: String },

    /// The agent could not be reached or is not configured.
    #[error("agent unavailable: {0}")]
    AgentUnavailable(AgentError),

    /// The agent answered but refused or failed the request.
    #[error("agent reported failure for ticket #{ticket}: {error}")]
    AgentReportedFailure { ticket: u64, error: String },

    /// Issue source error.
    #[error("issue source error: {0}")]
    IssueSource(#[from] IssueSourceError),

    /// Ticket store error.
    #[error("ticket store error: {0}")]
    Store(#[from] StoreError),
}

impl OrchestratorError {
    pub(crate) fn ticket_not_found(number: u64) -> Self {
        OrchestratorError::NotFound(format!("ticket #{}", number))
    }

    /// Convert a rejected transition for the given ticket.
    ///
    /// Stale outcomes only reach callers through the supervisor, where they
    /// are swallowed; surfacing one here means the ticket moved underneath.
    pub(crate) fn from_transition(ticket: u64, err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { current, requested } => {
                OrchestratorError::InvalidTransition {
                    ticket,
                    current: current.to_string(),
                    requested: requested.to_string(),
                }
            }
            TransitionError::Conflict { active_job } => {
                OrchestratorError::Conflict { ticket, active_job }
            }
            TransitionError::Stale { job_id } => OrchestratorError::InvalidTransition {
                ticket,
                current: "stale".to_string(),
                requested: format!("reconcile job {}", job_id),
            },
        }
    }

    /// Map an agent error to the facade taxonomy.
    ///
    /// Transport problems mean the agent is unavailable; anything the agent
    /// itself answered is a reported failure.
    pub(crate) fn from_agent(ticket: u64, err: AgentError) -> Self {
        match err {
            AgentError::ApiError(_) | AgentError::InvalidResponse(_) | AgentError::JobNotFound(_) => {
                OrchestratorError::AgentReportedFailure {
                    ticket,
                    error: err.to_string(),
                }
            }
            other => OrchestratorError::AgentUnavailable(other),
        }
    }
}

/// Result of a scope request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScopeOutcome {
    pub ticket_number: u64,
    pub title: String,
    pub analysis: Analysis,
}

/// Result of syncing tickets from the issue source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSummary {
    /// Issues seen for the first time.
    pub imported: usize,
    /// Known tickets whose source fields changed.
    pub refreshed: usize,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Ticket count per status, every status present.
    pub tickets_by_state: BTreeMap<String, usize>,
    pub total_tickets: usize,
    /// Jobs with a live polling task.
    pub active_jobs: usize,
}

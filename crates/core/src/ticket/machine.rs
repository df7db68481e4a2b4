//! Ticket transition table.
//!
//! Every status change goes through [`Ticket::apply`]. An event that is not
//! legal from the current status leaves the ticket untouched.

use chrono::Utc;
use thiserror::Error;

use crate::scoring::Analysis;

use super::types::{Setback, Ticket, TicketStatus};

/// Something that asks a ticket to change status.
#[derive(Debug, Clone)]
pub enum TicketEvent {
    /// Attach the first analysis (`new -> scoped`).
    Scope { analysis: Analysis },
    /// Overwrite the analysis of a scoped ticket.
    RegenerateScope { analysis: Analysis },
    /// Start a job (`scoped -> in_progress`).
    Execute { job_id: String },
    /// The agent finished the job.
    JobCompleted {
        job_id: String,
        branch_name: String,
        pr_number: Option<u64>,
        pr_url: Option<String>,
    },
    /// The job failed.
    JobFailed { job_id: String, error: String },
    /// User cancelled the running job.
    Cancel,
    /// Review accepted.
    Complete,
}

impl TicketEvent {
    /// Operation name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            TicketEvent::Scope { .. } => "scope",
            TicketEvent::RegenerateScope { .. } => "regenerate_scope",
            TicketEvent::Execute { .. } => "execute",
            TicketEvent::JobCompleted { .. } => "job_completed",
            TicketEvent::JobFailed { .. } => "job_failed",
            TicketEvent::Cancel => "cancel",
            TicketEvent::Complete => "complete",
        }
    }
}

/// Rejected transition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {requested} a ticket in state {current}")]
    InvalidTransition {
        current: &'static str,
        requested: &'static str,
    },

    #[error("ticket already has an active job ({active_job})")]
    Conflict { active_job: String },

    /// A job outcome for a job that is no longer the ticket's active job.
    #[error("outcome of job {job_id} is stale")]
    Stale { job_id: String },
}

/// A status change that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: &'static str,
    pub to: &'static str,
}

impl Ticket {
    /// Apply an event, bumping `updated_at` on success.
    pub fn apply(&mut self, event: TicketEvent) -> Result<Transition, TransitionError> {
        let now = Utc::now();
        let from = self.status.state_type();
        let requested = event.name();
        let invalid = TransitionError::InvalidTransition {
            current: from,
            requested,
        };

        let (status, analysis) = match (&self.status, event) {
            (TicketStatus::New, TicketEvent::Scope { analysis }) => {
                (TicketStatus::Scoped { setback: None }, Some(analysis))
            }

            (TicketStatus::Scoped { setback }, TicketEvent::RegenerateScope { analysis }) => (
                TicketStatus::Scoped {
                    setback: setback.clone(),
                },
                Some(analysis),
            ),

            (TicketStatus::Scoped { .. }, TicketEvent::Execute { job_id }) => (
                TicketStatus::InProgress {
                    job_id,
                    started_at: now,
                },
                None,
            ),

            (TicketStatus::InProgress { job_id: active, .. }, TicketEvent::Execute { .. }) => {
                return Err(TransitionError::Conflict {
                    active_job: active.clone(),
                });
            }

            (
                TicketStatus::InProgress { job_id: active, .. },
                TicketEvent::JobCompleted {
                    job_id,
                    branch_name,
                    pr_number,
                    pr_url,
                },
            ) if *active == job_id => (
                TicketStatus::Review {
                    branch_name,
                    pr_number,
                    pr_url,
                    ready_at: now,
                },
                None,
            ),

            (
                TicketStatus::InProgress { job_id: active, .. },
                TicketEvent::JobFailed { job_id, error },
            ) if *active == job_id => (
                TicketStatus::Scoped {
                    setback: Some(Setback::JobFailed {
                        job_id,
                        error,
                        failed_at: now,
                    }),
                },
                None,
            ),

            (_, TicketEvent::JobCompleted { job_id, .. })
            | (_, TicketEvent::JobFailed { job_id, .. }) => {
                return Err(TransitionError::Stale { job_id });
            }

            (TicketStatus::InProgress { job_id, .. }, TicketEvent::Cancel) => (
                TicketStatus::Scoped {
                    setback: Some(Setback::Cancelled {
                        job_id: job_id.clone(),
                        cancelled_at: now,
                    }),
                },
                None,
            ),

            (
                TicketStatus::Review {
                    branch_name,
                    pr_number,
                    pr_url,
                    ..
                },
                TicketEvent::Complete,
            ) => (
                TicketStatus::Complete {
                    branch_name: branch_name.clone(),
                    pr_number: *pr_number,
                    pr_url: pr_url.clone(),
                    completed_at: now,
                },
                None,
            ),

            _ => return Err(invalid),
        };

        self.status = status;
        if analysis.is_some() {
            self.analysis = analysis;
        }
        self.updated_at = now;

        Ok(Transition {
            from,
            to: self.status.state_type(),
        })
    }
}

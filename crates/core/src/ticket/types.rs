//! Core ticket data types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::issue_source::RawIssue;
use crate::scoring::Analysis;

/// Why a scoped ticket is back in `scoped` after having been executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Setback {
    /// The last job failed; the ticket can be executed again.
    JobFailed {
        job_id: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
    /// The last job was cancelled by the user.
    Cancelled {
        job_id: String,
        cancelled_at: DateTime<Utc>,
    },
}

impl Setback {
    pub fn job_id(&self) -> &str {
        match self {
            Setback::JobFailed { job_id, .. } | Setback::Cancelled { job_id, .. } => job_id,
        }
    }
}

/// Ticket workflow status.
///
/// State transitions:
/// ```text
/// New -> Scoped -> InProgress -> Review -> Complete
///          ^           |
///          |           v
///          +---- Scoped { setback } (job failed or cancelled)
/// ```
///
/// Variant payloads carry the data that only exists in that state, so a
/// ticket in review always has a branch and only an in-progress ticket has
/// an active job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketStatus {
    /// Imported from the issue source, not analyzed yet.
    New,

    /// Analysis attached, ready to execute.
    Scoped {
        /// Set when a previous job failed or was cancelled.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        setback: Option<Setback>,
    },

    /// A remediation job is running.
    InProgress {
        /// The single active job for this ticket.
        job_id: String,
        started_at: DateTime<Utc>,
    },

    /// The job finished and produced a branch ready for review.
    Review {
        branch_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pr_number: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pr_url: Option<String>,
        ready_at: DateTime<Utc>,
    },

    /// Review accepted (terminal).
    Complete {
        branch_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pr_number: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pr_url: Option<String>,
        completed_at: DateTime<Utc>,
    },
}

impl TicketStatus {
    /// Returns the state type as a string (for filtering and metrics).
    pub fn state_type(&self) -> &'static str {
        match self {
            TicketStatus::New => "new",
            TicketStatus::Scoped { .. } => "scoped",
            TicketStatus::InProgress { .. } => "in_progress",
            TicketStatus::Review { .. } => "review",
            TicketStatus::Complete { .. } => "complete",
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Complete { .. })
    }

    /// Id of the running job, if any.
    pub fn active_job_id(&self) -> Option<&str> {
        match self {
            TicketStatus::InProgress { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    pub fn setback(&self) -> Option<&Setback> {
        match self {
            TicketStatus::Scoped { setback } => setback.as_ref(),
            _ => None,
        }
    }

    /// Returns true if the ticket is in the failed sub-state of `scoped`.
    pub fn is_failed(&self) -> bool {
        matches!(self.setback(), Some(Setback::JobFailed { .. }))
    }

    pub fn branch_name(&self) -> Option<&str> {
        match self {
            TicketStatus::Review { branch_name, .. } | TicketStatus::Complete { branch_name, .. } => {
                Some(branch_name)
            }
            _ => None,
        }
    }

    pub fn pr_number(&self) -> Option<u64> {
        match self {
            TicketStatus::Review { pr_number, .. } | TicketStatus::Complete { pr_number, .. } => {
                *pr_number
            }
            _ => None,
        }
    }

    pub fn pr_url(&self) -> Option<&str> {
        match self {
            TicketStatus::Review { pr_url, .. } | TicketStatus::Complete { pr_url, .. } => {
                pr_url.as_deref()
            }
            _ => None,
        }
    }
}

/// An issue tracked through the remediation workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Issue number assigned by the issue source.
    pub number: u64,

    /// Identifier of the issue in the source system.
    pub external_id: String,

    pub title: String,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub labels: BTreeSet<String>,

    /// Link to the issue in the source system.
    pub url: String,

    /// Current status.
    pub status: TicketStatus,

    /// Scoping output, attached by the scope operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,

    pub created_at: DateTime<Utc>,

    /// Last update timestamp, bumped by every status change and refresh.
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a `new` ticket from an imported issue.
    pub fn from_issue(issue: &RawIssue) -> Self {
        Self {
            number: issue.number,
            external_id: issue.id.clone(),
            title: issue.title.clone(),
            body: issue.body.clone(),
            labels: issue.labels.iter().cloned().collect(),
            url: issue.url.clone(),
            status: TicketStatus::New,
            analysis: None,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
        }
    }

    /// Refresh source-owned fields. Status and analysis are never touched.
    ///
    /// Returns true if anything changed.
    pub fn refresh_from(&mut self, issue: &RawIssue) -> bool {
        let labels: BTreeSet<String> = issue.labels.iter().cloned().collect();
        let changed = self.title != issue.title
            || self.body != issue.body
            || self.labels != labels
            || self.url != issue.url;

        if changed {
            self.title = issue.title.clone();
            self.body = issue.body.clone();
            self.labels = labels;
            self.url = issue.url.clone();
            self.updated_at = Utc::now();
        }
        changed
    }
}

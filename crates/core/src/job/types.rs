//! Remediation job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentJobReport;

/// Error message recorded on a job stopped by the user.
pub const CANCELLED_BY_USER: &str = "Cancelled by user";

/// Lifecycle of a job. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// One remediation attempt for a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Unique identifier (UUID).
    pub id: String,

    /// Ticket this job works on.
    pub ticket_number: u64,

    /// Identifier assigned by the agent once it accepted the job.
    #[serde(default)]
    pub agent_job_id: Option<String>,

    pub status: JobStatus,

    /// Human-readable description of what the agent is doing.
    #[serde(default)]
    pub current_step: Option<String>,

    /// Never exceeds `total_steps`.
    pub steps_completed: u32,

    pub total_steps: u32,

    /// Set if and only if the job failed.
    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default)]
    pub worktree_path: Option<String>,

    #[serde(default)]
    pub branch_name: Option<String>,

    #[serde(default)]
    pub pr_number: Option<u64>,

    #[serde(default)]
    pub pr_url: Option<String>,

    /// Last transport problem seen while polling (not a job failure).
    #[serde(default)]
    pub last_poll_error: Option<String>,

    /// Poll failures since the last successful status query.
    #[serde(default)]
    pub consecutive_poll_failures: u32,

    pub started_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a running job with no progress.
    pub fn new(ticket_number: u64, total_steps: u32) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_number,
            agent_job_id: None,
            status: JobStatus::Running,
            current_step: Some("Starting".to_string()),
            steps_completed: 0,
            total_steps: total_steps.max(1),
            error_message: None,
            worktree_path: None,
            branch_name: None,
            pr_number: None,
            pr_url: None,
            last_poll_error: None,
            consecutive_poll_failures: 0,
            started_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn attach_agent_job(&mut self, agent_job_id: impl Into<String>) {
        self.agent_job_id = Some(agent_job_id.into());
        self.updated_at = Utc::now();
    }

    /// Merge progress fields from a status report. Status is left to the caller.
    ///
    /// Fields the report leaves empty keep their current value.
    pub fn merge_report(&mut self, report: &AgentJobReport) {
        if let Some(total) = report.total_steps.filter(|t| *t > 0) {
            self.total_steps = total;
        }
        if let Some(completed) = report.steps_completed {
            self.steps_completed = completed;
        }
        self.steps_completed = self.steps_completed.min(self.total_steps);

        if report.current_step.is_some() {
            self.current_step = report.current_step.clone();
        }
        if report.worktree_path.is_some() {
            self.worktree_path = report.worktree_path.clone();
        }
        if report.branch_name.is_some() {
            self.branch_name = report.branch_name.clone();
        }
        if report.pr_number.is_some() {
            self.pr_number = report.pr_number;
        }
        if report.pr_url.is_some() {
            self.pr_url = report.pr_url.clone();
        }

        self.last_poll_error = None;
        self.consecutive_poll_failures = 0;
        self.updated_at = Utc::now();
    }

    /// Record a failed status query. The job keeps running.
    pub fn record_poll_failure(&mut self, error: impl Into<String>) {
        self.last_poll_error = Some(error.into());
        self.consecutive_poll_failures += 1;
        self.updated_at = Utc::now();
    }

    /// Mark the job completed. Returns false if it was already terminal.
    pub fn complete(&mut self, branch_name: String, pr_number: Option<u64>, pr_url: Option<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.current_step = Some("Complete".to_string());
        self.steps_completed = self.total_steps;
        self.branch_name = Some(branch_name);
        self.pr_number = pr_number.or(self.pr_number);
        self.pr_url = pr_url.or(self.pr_url.take());
        self.updated_at = now;
        self.finished_at = Some(now);
        true
    }

    /// Mark the job failed. Returns false if it was already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.current_step = Some("Error".to_string());
        self.error_message = Some(error.into());
        self.updated_at = now;
        self.finished_at = Some(now);
        true
    }
}

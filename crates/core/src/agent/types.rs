//! Types for remediation agent operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::{self, Analysis};
use crate::ticket::Ticket;

/// Errors that can occur while talking to a remediation agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent not configured: {0}")]
    NotConfigured(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Handle returned when the agent accepts an execution request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobHandle {
    /// Agent-side job identifier, used for status queries and cancellation.
    pub id: String,
}

/// Job status as reported by the agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentJobStatus {
    Running,
    Completed,
    Failed,
}

/// Snapshot of an agent job. Absent fields leave the tracked job unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentJobReport {
    pub status: AgentJobStatus,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub steps_completed: Option<u32>,
    #[serde(default)]
    pub total_steps: Option<u32>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub worktree_path: Option<String>,
    #[serde(default)]
    pub pr_number: Option<u64>,
    #[serde(default)]
    pub pr_url: Option<String>,
}

impl AgentJobReport {
    /// A bare report with only a status.
    pub fn new(status: AgentJobStatus) -> Self {
        Self {
            status,
            current_step: None,
            steps_completed: None,
            total_steps: None,
            error_message: None,
            branch_name: None,
            worktree_path: None,
            pr_number: None,
            pr_url: None,
        }
    }

    pub fn running(step: impl Into<String>, steps_completed: u32) -> Self {
        Self {
            current_step: Some(step.into()),
            steps_completed: Some(steps_completed),
            ..Self::new(AgentJobStatus::Running)
        }
    }

    pub fn completed(branch_name: Option<String>, pr_number: Option<u64>, pr_url: Option<String>) -> Self {
        Self {
            branch_name,
            pr_number,
            pr_url,
            ..Self::new(AgentJobStatus::Completed)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error_message: Some(error.into()),
            ..Self::new(AgentJobStatus::Failed)
        }
    }
}

/// Trait for remediation agent backends.
#[async_trait]
pub trait RemediationAgent: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Produce an analysis for a ticket.
    ///
    /// Agents without their own scoping run the local scorer.
    async fn request_scope(&self, ticket: &Ticket) -> Result<Analysis, AgentError> {
        Ok(scoring::analyze(ticket))
    }

    /// Start remediating a ticket.
    async fn request_execution(&self, ticket: &Ticket) -> Result<JobHandle, AgentError>;

    /// Query the current state of a job.
    async fn query_status(&self, job_id: &str) -> Result<AgentJobReport, AgentError>;

    /// Stop a job. Best-effort; callers do not wait on the outcome.
    async fn cancel(&self, job_id: &str) -> Result<(), AgentError>;

    /// Release agent-side resources for a completed ticket.
    async fn cleanup(&self, _ticket_number: u64) -> Result<(), AgentError> {
        Ok(())
    }
}

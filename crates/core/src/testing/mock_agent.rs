//! Mock remediation agent for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::agent::{AgentError, AgentJobReport, AgentJobStatus, JobHandle, RemediationAgent};
use crate::scoring::{self, Analysis};
use crate::ticket::Ticket;

/// Scripted answer to a status query.
#[derive(Debug)]
enum Scripted {
    Report(AgentJobReport),
    Error(AgentError),
}

/// Mock implementation of the RemediationAgent trait.
///
/// Agent job ids are handed out in order: `mock-job-1`, `mock-job-2`, ...
///
/// Status queries answer from a per-job script. Errors are consumed once; the
/// last scripted report is repeated until another one is pushed. A job with no
/// script reports a bare `running` status.
///
/// # Example
///
/// ```rust,ignore
/// let agent = MockAgent::new();
/// agent.push_report("mock-job-1", AgentJobReport::running("Implementing", 3)).await;
/// agent.push_report("mock-job-1", AgentJobReport::completed(Some("fix-42".into()), Some(7), None)).await;
///
/// let orchestrator = RemediationOrchestrator::new(config, store, None, Some(Arc::new(agent.clone())));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockAgent {
    /// Ticket numbers passed to request_execution.
    executions: Arc<RwLock<Vec<u64>>>,
    /// Ticket numbers passed to request_scope.
    scopes: Arc<RwLock<Vec<u64>>>,
    /// Agent job ids passed to query_status.
    status_queries: Arc<RwLock<Vec<String>>>,
    /// Agent job ids passed to cancel.
    cancelled: Arc<RwLock<Vec<String>>>,
    /// Ticket numbers passed to cleanup.
    cleaned_up: Arc<RwLock<Vec<u64>>>,
    scripts: Arc<RwLock<HashMap<String, VecDeque<Scripted>>>>,
    /// If set, the next execution request fails with this error.
    next_execution_error: Arc<RwLock<Option<AgentError>>>,
    /// If set, the next scope request fails with this error.
    next_scope_error: Arc<RwLock<Option<AgentError>>>,
    scope_analysis: Arc<RwLock<Option<Analysis>>>,
    launch_delay: Arc<RwLock<Option<Duration>>>,
    status_delay: Arc<RwLock<Option<Duration>>>,
    job_counter: Arc<RwLock<u32>>,
}

impl MockAgent {
    /// Create a new mock agent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a report to a job's script.
    pub async fn push_report(&self, agent_job_id: &str, report: AgentJobReport) {
        self.scripts
            .write()
            .await
            .entry(agent_job_id.to_string())
            .or_default()
            .push_back(Scripted::Report(report));
    }

    /// Append a failing status query to a job's script.
    pub async fn push_status_error(&self, agent_job_id: &str, error: AgentError) {
        self.scripts
            .write()
            .await
            .entry(agent_job_id.to_string())
            .or_default()
            .push_back(Scripted::Error(error));
    }

    /// Configure the next execution request to fail with the given error.
    pub async fn set_next_execution_error(&self, error: AgentError) {
        *self.next_execution_error.write().await = Some(error);
    }

    /// Configure the next scope request to fail with the given error.
    pub async fn set_next_scope_error(&self, error: AgentError) {
        *self.next_scope_error.write().await = Some(error);
    }

    /// Return this analysis from scope requests instead of the local scorer.
    pub async fn set_scope_analysis(&self, analysis: Analysis) {
        *self.scope_analysis.write().await = Some(analysis);
    }

    /// Delay execution requests, to open a window between launch and acceptance.
    pub async fn set_launch_delay(&self, delay: Duration) {
        *self.launch_delay.write().await = Some(delay);
    }

    /// Delay status queries, e.g. past the orchestrator's query timeout.
    pub async fn set_status_delay(&self, delay: Option<Duration>) {
        *self.status_delay.write().await = delay;
    }

    pub async fn execution_requests(&self) -> Vec<u64> {
        self.executions.read().await.clone()
    }

    pub async fn scope_requests(&self) -> Vec<u64> {
        self.scopes.read().await.clone()
    }

    pub async fn status_queries(&self) -> Vec<String> {
        self.status_queries.read().await.clone()
    }

    pub async fn cancelled_jobs(&self) -> Vec<String> {
        self.cancelled.read().await.clone()
    }

    pub async fn cleaned_up(&self) -> Vec<u64> {
        self.cleaned_up.read().await.clone()
    }

    async fn next_job_id(&self) -> String {
        let mut counter = self.job_counter.write().await;
        *counter += 1;
        format!("mock-job-{}", *counter)
    }

    async fn next_scripted(&self, agent_job_id: &str) -> Result<AgentJobReport, AgentError> {
        let mut scripts = self.scripts.write().await;
        let Some(queue) = scripts.get_mut(agent_job_id) else {
            return Ok(AgentJobReport::new(AgentJobStatus::Running));
        };

        let repeat_last = queue.len() == 1 && matches!(queue.front(), Some(Scripted::Report(_)));
        if repeat_last {
            if let Some(Scripted::Report(report)) = queue.front() {
                return Ok(report.clone());
            }
        }

        match queue.pop_front() {
            Some(Scripted::Report(report)) => Ok(report),
            Some(Scripted::Error(error)) => Err(error),
            None => Ok(AgentJobReport::new(AgentJobStatus::Running)),
        }
    }
}

#[async_trait]
impl RemediationAgent for MockAgent {
    fn name(&self) -> &str {
        "mock"
    }

    async fn request_scope(&self, ticket: &Ticket) -> Result<Analysis, AgentError> {
        self.scopes.write().await.push(ticket.number);
        if let Some(error) = self.next_scope_error.write().await.take() {
            return Err(error);
        }
        match self.scope_analysis.read().await.clone() {
            Some(analysis) => Ok(analysis),
            None => Ok(scoring::analyze(ticket)),
        }
    }

    async fn request_execution(&self, ticket: &Ticket) -> Result<JobHandle, AgentError> {
        self.executions.write().await.push(ticket.number);

        let delay = *self.launch_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_execution_error.write().await.take() {
            return Err(error);
        }

        Ok(JobHandle {
            id: self.next_job_id().await,
        })
    }

    async fn query_status(&self, job_id: &str) -> Result<AgentJobReport, AgentError> {
        self.status_queries.write().await.push(job_id.to_string());

        let delay = *self.status_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.next_scripted(job_id).await
    }

    async fn cancel(&self, job_id: &str) -> Result<(), AgentError> {
        self.cancelled.write().await.push(job_id.to_string());
        Ok(())
    }

    async fn cleanup(&self, ticket_number: u64) -> Result<(), AgentError> {
        self.cleaned_up.write().await.push(ticket_number);
        Ok(())
    }
}

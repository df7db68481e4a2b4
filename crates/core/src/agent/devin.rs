//! Devin sessions API agent implementation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::DevinConfig;
use crate::ticket::Ticket;

use super::{AgentError, AgentJobReport, AgentJobStatus, JobHandle, RemediationAgent};

/// Steps reported while a session is working.
const WORKING_STEPS: [&str; 3] = [
    "Devin is analyzing the codebase...",
    "Devin is implementing the solution...",
    "Devin is testing and creating PR...",
];

const TOTAL_STEPS: u32 = 4;

#[derive(Debug, Serialize)]
struct CreateSessionRequest {
    prompt: String,
    title: String,
    tags: Vec<String>,
    unlisted: bool,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session_id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionDetails {
    #[serde(default)]
    status_enum: Option<String>,
    #[serde(default)]
    pull_request: Option<PullRequestRef>,
}

#[derive(Debug, Deserialize)]
struct PullRequestRef {
    #[serde(default)]
    url: Option<String>,
}

/// Local bookkeeping for a session started by this process.
#[derive(Debug, Clone)]
struct SessionInfo {
    url: Option<String>,
    started: Instant,
}

/// Remediation agent backed by Devin sessions.
pub struct DevinAgent {
    client: Client,
    config: DevinConfig,
    sessions: RwLock<HashMap<String, SessionInfo>>,
}

impl DevinAgent {
    /// Create a new Devin agent.
    pub fn new(config: DevinConfig) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| AgentError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, AgentError> {
        if self.config.api_key.is_empty() {
            return Err(AgentError::NotConfigured(
                "Devin API key not configured".to_string(),
            ));
        }
        Ok(request.bearer_auth(&self.config.api_key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AgentError> {
        self.authorized(request)?.send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout
            } else if e.is_connect() {
                AgentError::ConnectionFailed(e.to_string())
            } else {
                AgentError::ApiError(e.to_string())
            }
        })
    }
}

#[async_trait]
impl RemediationAgent for DevinAgent {
    fn name(&self) -> &str {
        "devin"
    }

    async fn request_execution(&self, ticket: &Ticket) -> Result<JobHandle, AgentError> {
        let url = format!("{}/sessions", self.base_url());
        let payload = CreateSessionRequest {
            prompt: build_prompt(ticket),
            title: format!(
                "Fix issue #{}: {}",
                ticket.number,
                ticket.title.chars().take(50).collect::<String>()
            ),
            tags: vec![format!("issue-{}", ticket.number)],
            unlisted: false,
        };

        let response = self.send(self.client.post(&url).json(&payload)).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ApiError(format!(
                "Failed to create Devin session: HTTP {} - {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let created: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

        info!(
            ticket = ticket.number,
            session_id = %created.session_id,
            "Created Devin session"
        );

        self.sessions.write().await.insert(
            created.session_id.clone(),
            SessionInfo {
                url: created.url,
                started: Instant::now(),
            },
        );

        Ok(JobHandle {
            id: created.session_id,
        })
    }

    async fn query_status(&self, job_id: &str) -> Result<AgentJobReport, AgentError> {
        let url = format!("{}/sessions/{}", self.base_url(), job_id);
        let response = self.send(self.client.get(&url)).await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(AgentError::JobNotFound(job_id.to_string()));
        }
        if !status.is_success() {
            return Err(AgentError::ApiError(format!(
                "Failed to get Devin session: HTTP {}",
                status
            )));
        }

        let details: SessionDetails = response
            .json()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

        let session = self.sessions.read().await.get(job_id).cloned();
        let (elapsed, session_url) = match session {
            Some(info) => (info.started.elapsed(), info.url),
            None => (Duration::ZERO, None),
        };

        let report = session_report(&details, elapsed, session_url.as_deref());
        debug!(session_id = job_id, status = ?report.status, "Polled Devin session");

        if report.status != AgentJobStatus::Running {
            self.sessions.write().await.remove(job_id);
        }
        Ok(report)
    }

    async fn cancel(&self, job_id: &str) -> Result<(), AgentError> {
        let url = format!("{}/sessions/{}", self.base_url(), job_id);
        let response = self.send(self.client.delete(&url)).await?;
        self.sessions.write().await.remove(job_id);

        let status = response.status();
        if status.is_success() {
            info!(session_id = job_id, "Terminated Devin session");
            Ok(())
        } else {
            warn!(session_id = job_id, %status, "Failed to terminate Devin session");
            Err(AgentError::ApiError(format!("HTTP {}", status)))
        }
    }
}

fn build_prompt(ticket: &Ticket) -> String {
    format!(
        "Please fix the following GitHub issue ({url}):\n\n\
         Issue #{number}: {title}\n\n\
         {body}\n\n\
         Instructions:\n\
         1. Clone the repository the issue belongs to\n\
         2. Analyze the issue and understand what needs to be fixed\n\
         3. Implement the fix with proper code changes\n\
         4. Create a pull request with your changes\n\
         5. Make sure the PR description references issue #{number}\n\n\
         Please create a PR when you're done.",
        url = ticket.url,
        number = ticket.number,
        title = ticket.title,
        body = ticket.body.as_deref().unwrap_or(""),
    )
}

/// Map a session's `status_enum` to a job report.
fn session_report(
    details: &SessionDetails,
    elapsed: Duration,
    session_url: Option<&str>,
) -> AgentJobReport {
    let mut report = match details.status_enum.as_deref().unwrap_or("") {
        "working" => {
            let step = (1 + elapsed.as_secs() / 60).min(WORKING_STEPS.len() as u64) as u32;
            AgentJobReport::running(WORKING_STEPS[step as usize - 1], step)
        }
        "blocked" => AgentJobReport::running(
            format!(
                "Devin needs assistance - check {}",
                session_url.unwrap_or("the session")
            ),
            2,
        ),
        "finished" => {
            let pr_url = details
                .pull_request
                .as_ref()
                .and_then(|pr| pr.url.clone());
            let pr_number = pr_url.as_deref().and_then(pr_number_from_url);
            AgentJobReport::completed(None, pr_number, pr_url)
        }
        status @ ("expired" | "suspend_requested") => {
            AgentJobReport::failed(format!("Devin session ended unexpectedly: {}", status))
        }
        _ => AgentJobReport::new(AgentJobStatus::Running),
    };

    report.total_steps = Some(TOTAL_STEPS);
    report.worktree_path = session_url.map(str::to_string);
    report
}

/// Extract the PR number from a URL like `https://github.com/o/r/pull/7`.
fn pr_number_from_url(url: &str) -> Option<u64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

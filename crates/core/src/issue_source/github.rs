//! GitHub issues backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GitHubConfig;

use super::{IssueSource, IssueSourceError, RawIssue};

const PAGE_SIZE: u32 = 100;

/// Upper bound on pages fetched per issue state.
const MAX_PAGES: usize = 50;

/// Issue as returned by `GET /repos/{repo}/issues`.
#[derive(Debug, Deserialize)]
struct GitHubIssue {
    id: u64,
    #[serde(default)]
    node_id: Option<String>,
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    html_url: String,
    /// Present only when the "issue" is a pull request.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GitHubLabel {
    name: String,
}

impl From<GitHubIssue> for RawIssue {
    fn from(issue: GitHubIssue) -> Self {
        RawIssue {
            id: issue.node_id.unwrap_or_else(|| issue.id.to_string()),
            number: issue.number,
            title: issue.title,
            body: issue.body,
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            url: issue.html_url,
        }
    }
}

/// Issue source backed by the GitHub REST API.
pub struct GitHubIssueSource {
    client: Client,
    config: GitHubConfig,
}

impl GitHubIssueSource {
    /// Create a new GitHub issue source.
    pub fn new(config: GitHubConfig) -> Result<Self, IssueSourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .user_agent(concat!("remediator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IssueSourceError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn issues_url(&self) -> String {
        format!(
            "{}/repos/{}/issues",
            self.config.api_url.trim_end_matches('/'),
            self.config.repo
        )
    }

    /// Fetch every page of issues in the given state ("open" or "closed").
    async fn fetch_state(&self, state: &str) -> Result<Vec<RawIssue>, IssueSourceError> {
        let per_page = PAGE_SIZE.to_string();
        let first = self
            .client
            .get(self.issues_url())
            .query(&[("state", state), ("per_page", per_page.as_str())]);

        let (mut issues, mut next) = self.fetch_page(first).await?;
        let mut pages = 1;
        while let Some(url) = next {
            if pages >= MAX_PAGES {
                warn!(repo = %self.config.repo, state, pages, "Stopping issue listing at page limit");
                break;
            }
            let (page, following) = self.fetch_page(self.client.get(url)).await?;
            issues.extend(page);
            next = following;
            pages += 1;
        }

        debug!(repo = %self.config.repo, state, pages, count = issues.len(), "Fetched GitHub issues");
        Ok(issues)
    }

    /// Send one listing request. Returns its issues and the next page URL, if any.
    async fn fetch_page(
        &self,
        request: RequestBuilder,
    ) -> Result<(Vec<RawIssue>, Option<String>), IssueSourceError> {
        let mut request = request.header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                IssueSourceError::Timeout
            } else if e.is_connect() {
                IssueSourceError::ConnectionFailed(e.to_string())
            } else {
                IssueSourceError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(IssueSourceError::AuthenticationFailed(format!("HTTP {}", status)));
        }

        let next = next_page_url(
            response
                .headers()
                .get(header::LINK)
                .and_then(|value| value.to_str().ok()),
        );

        let body = response
            .text()
            .await
            .map_err(|e| IssueSourceError::ApiError(e.to_string()))?;

        if !status.is_success() {
            return Err(IssueSourceError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok((parse_issues(&body)?, next))
    }
}

#[async_trait]
impl IssueSource for GitHubIssueSource {
    fn name(&self) -> &str {
        "github"
    }

    async fn fetch_issues(&self) -> Result<Vec<RawIssue>, IssueSourceError> {
        let mut issues = self.fetch_state("open").await?;

        match self.fetch_state("closed").await {
            Ok(closed) => issues.extend(closed),
            Err(e) => warn!(repo = %self.config.repo, error = %e, "Failed to fetch closed issues"),
        }

        Ok(issues)
    }
}

/// The `rel="next"` target of a `Link` header.
fn next_page_url(link: Option<&str>) -> Option<String> {
    link?.split(',').find_map(|part| {
        let (target, params) = part.trim().split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim().eq_ignore_ascii_case("rel=\"next\""));
        let url = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        is_next.then(|| url.to_string())
    })
}

/// Parse an issues listing, dropping pull requests.
fn parse_issues(json: &str) -> Result<Vec<RawIssue>, IssueSourceError> {
    let issues: Vec<GitHubIssue> =
        serde_json::from_str(json).map_err(|e| IssueSourceError::ParseError(e.to_string()))?;

    Ok(issues
        .into_iter()
        .filter(|issue| issue.pull_request.is_none())
        .map(RawIssue::from)
        .collect())
}

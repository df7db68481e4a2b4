//! Types for issue source operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while fetching issues.
#[derive(Debug, Error)]
pub enum IssueSourceError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// An issue as delivered by the source, before it becomes a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawIssue {
    /// Source-specific identifier.
    pub id: String,
    /// Issue number, unique within the source.
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
}

/// Trait for issue source backends.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Fetch every issue the source currently knows about.
    async fn fetch_issues(&self) -> Result<Vec<RawIssue>, IssueSourceError>;
}

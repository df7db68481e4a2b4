//! Mock issue source for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::issue_source::{IssueSource, IssueSourceError, RawIssue};

/// Mock implementation of the IssueSource trait.
///
/// Returns the configured issues on every fetch. A configured error fails only
/// the next fetch.
#[derive(Debug, Clone, Default)]
pub struct MockIssueSource {
    issues: Arc<RwLock<Vec<RawIssue>>>,
    next_error: Arc<RwLock<Option<IssueSourceError>>>,
    fetch_count: Arc<RwLock<usize>>,
}

impl MockIssueSource {
    /// Create a new mock issue source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock issue source serving the given issues.
    pub fn with_issues(issues: Vec<RawIssue>) -> Self {
        Self {
            issues: Arc::new(RwLock::new(issues)),
            ..Self::default()
        }
    }

    /// Replace the served issues.
    pub async fn set_issues(&self, issues: Vec<RawIssue>) {
        *self.issues.write().await = issues;
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: IssueSourceError) {
        *self.next_error.write().await = Some(error);
    }

    /// Number of fetches made, failed ones included.
    pub async fn fetch_count(&self) -> usize {
        *self.fetch_count.read().await
    }
}

#[async_trait]
impl IssueSource for MockIssueSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_issues(&self) -> Result<Vec<RawIssue>, IssueSourceError> {
        *self.fetch_count.write().await += 1;
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(self.issues.read().await.clone())
    }
}

//! Testing utilities and mock implementations.
//!
//! Mock implementations of the external service traits, so the orchestrator
//! can be exercised end to end without GitHub or a live agent.
//!
//! # Example
//!
//! ```rust,ignore
//! use remediator_core::testing::{fixtures, MockAgent, MockIssueSource};
//!
//! let source = MockIssueSource::with_issues(vec![fixtures::raw_issue(42, "Crash on save", "...")]);
//! let agent = MockAgent::new();
//! agent.push_report("mock-job-1", AgentJobReport::running("Implementing", 3)).await;
//! ```

mod flaky_store;
mod mock_agent;
mod mock_issue_source;

pub use flaky_store::FlakyStore;
pub use mock_agent::MockAgent;
pub use mock_issue_source::MockIssueSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::issue_source::RawIssue;
    use crate::orchestrator::OrchestratorConfig;
    use crate::ticket::Ticket;

    /// Create a raw GitHub-style issue.
    pub fn raw_issue(number: u64, title: &str, body: &str) -> RawIssue {
        RawIssue {
            id: format!("I_kwDO{:06}", number),
            number,
            title: title.to_string(),
            body: Some(body.to_string()),
            labels: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            url: format!("https://github.com/acme/app/issues/{}", number),
        }
    }

    /// Create a `new` ticket.
    pub fn ticket(number: u64, title: &str, body: &str) -> Ticket {
        Ticket::from_issue(&raw_issue(number, title, body))
    }

    /// Orchestrator config with fast polling for tests.
    pub fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval_ms: 10,
            status_query_timeout_ms: 200,
            ..OrchestratorConfig::default()
        }
    }
}

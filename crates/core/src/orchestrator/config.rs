//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where scoping analyses come from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    /// Run the built-in confidence scorer.
    #[default]
    Local,
    /// Ask the remediation agent.
    Agent,
}

/// Configuration for the remediation orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How often each job's status is polled (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Upper bound for a single status query (milliseconds).
    /// A query that takes longer counts as a poll failure.
    #[serde(default = "default_status_query_timeout")]
    pub status_query_timeout_ms: u64,

    /// Step count assumed for a new job until the agent reports its own.
    #[serde(default = "default_total_steps")]
    pub total_steps: u32,

    /// Prefix for the fallback branch name `{prefix}/issue-{number}`.
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    /// Fail a job that is still running after this long (0 = unlimited).
    #[serde(default = "default_max_poll_duration")]
    pub max_poll_duration_secs: u64,

    #[serde(default)]
    pub scope_mode: ScopeMode,
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_status_query_timeout() -> u64 {
    10_000
}

fn default_total_steps() -> u32 {
    4
}

fn default_branch_prefix() -> String {
    "devin".to_string()
}

fn default_max_poll_duration() -> u64 {
    3600 // 1 hour
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            status_query_timeout_ms: default_status_query_timeout(),
            total_steps: default_total_steps(),
            branch_prefix: default_branch_prefix(),
            max_poll_duration_secs: default_max_poll_duration(),
            scope_mode: ScopeMode::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn status_query_timeout(&self) -> Duration {
        Duration::from_millis(self.status_query_timeout_ms)
    }

    /// `None` when jobs may run forever.
    pub fn max_poll_duration(&self) -> Option<Duration> {
        (self.max_poll_duration_secs > 0).then(|| Duration::from_secs(self.max_poll_duration_secs))
    }

    /// Branch name used when the agent never reported one.
    pub fn fallback_branch(&self, ticket_number: u64) -> String {
        format!("{}/issue-{}", self.branch_prefix, ticket_number)
    }
}

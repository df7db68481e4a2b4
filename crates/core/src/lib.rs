pub mod agent;
pub mod config;
pub mod issue_source;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod scoring;
pub mod testing;
pub mod ticket;

pub use agent::{
    AgentError, AgentJobReport, AgentJobStatus, DevinAgent, JobHandle, RemediationAgent,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use issue_source::{GitHubIssueSource, IssueSource, IssueSourceError, RawIssue};
pub use job::{Job, JobStatus};
pub use orchestrator::{
    OrchestratorConfig, OrchestratorError, OrchestratorStatus, RemediationOrchestrator, ScopeMode,
    ScopeOutcome, SyncSummary, TicketUpdateCallback,
};
pub use scoring::{Analysis, ConfidenceScore};
pub use ticket::{
    Setback, SqliteTicketStore, StoreError, Ticket, TicketEvent, TicketStatus, TicketStore,
    TransitionError,
};

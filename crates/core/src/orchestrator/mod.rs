//! Remediation orchestrator.
//!
//! Combines the confidence scorer, the ticket state machine and job
//! supervision behind one facade:
//! - **Tickets**: one lock per ticket, every status change persisted first
//! - **Jobs**: one polling task per running job, reconciled exactly once

mod config;
mod registry;
mod runner;
mod supervisor;
mod types;

pub use config::{OrchestratorConfig, ScopeMode};
pub use runner::{RemediationOrchestrator, TicketUpdateCallback};
pub use types::{OrchestratorError, OrchestratorStatus, ScopeOutcome, SyncSummary};

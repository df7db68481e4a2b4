//! Remediation jobs tracked by the orchestrator.

mod types;

pub use types::*;

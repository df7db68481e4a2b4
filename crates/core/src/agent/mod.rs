//! Remediation agent abstraction.
//!
//! This module provides a `RemediationAgent` trait for the external service
//! that scopes and fixes tickets (Devin, etc.).

mod devin;
mod types;

pub use devin::DevinAgent;
pub use types::*;

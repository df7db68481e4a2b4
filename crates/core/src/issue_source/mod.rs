//! Issue source abstraction.
//!
//! This module provides an `IssueSource` trait for importing issues from an
//! external tracker (GitHub, etc.). Sources are read-only.

mod github;
mod types;

pub use github::GitHubIssueSource;
pub use types::*;

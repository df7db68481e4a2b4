//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scoping (requests, confidence distribution)
//! - Job supervision (jobs started/finished, poll failures)
//! - Ticket status transitions

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Scoping Metrics
// =============================================================================

/// Scope requests by source ("local", "agent", "cached").
pub static SCOPE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("remediator_scope_requests_total", "Total scope requests"),
        &["source"],
    )
    .unwrap()
});

/// Total confidence score of generated analyses.
pub static CONFIDENCE_SCORE: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "remediator_confidence_score",
            "Distribution of total confidence scores",
        )
        .buckets(vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]),
    )
    .unwrap()
});

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs started total.
pub static JOBS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("remediator_jobs_started_total", "Total remediation jobs started").unwrap()
});

/// Jobs finished by result.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "remediator_jobs_finished_total",
            "Total remediation jobs finished",
        ),
        &["result"], // "completed", "failed", "cancelled", "timed_out"
    )
    .unwrap()
});

/// Status queries that failed or timed out.
pub static POLL_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "remediator_poll_failures_total",
            "Job status queries that failed",
        ),
        &["reason"], // "timeout", "error"
    )
    .unwrap()
});

// =============================================================================
// Ticket Metrics
// =============================================================================

/// Ticket status transitions.
pub static TICKET_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "remediator_ticket_transitions_total",
            "Ticket status transitions",
        ),
        &["from_state", "to_state"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SCOPE_REQUESTS.clone()),
        Box::new(CONFIDENCE_SCORE.clone()),
        Box::new(JOBS_STARTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(POLL_FAILURES.clone()),
        Box::new(TICKET_TRANSITIONS.clone()),
    ]
}

//! Ticket scoping: confidence scoring and analysis.
//!
//! Scoring is pure and deterministic. The same title, body and labels always
//! produce the same breakdown, so a regenerated analysis only changes when the
//! issue content changed.

mod analysis;
mod scorer;
mod types;

pub use analysis::{action_plan, analyze, root_issue};
pub use scorer::{score, score_issue};
pub use types::{
    Analysis, ConfidenceBreakdown, ConfidenceScore, Dimension, DimensionScore, Factor, Impact,
    MAX_DIMENSION_SCORE, MAX_TOTAL_SCORE,
};

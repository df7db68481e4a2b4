//! Confidence score data types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound of a single dimension score.
pub const MAX_DIMENSION_SCORE: u8 = 25;

/// Upper bound of the total score (four dimensions).
pub const MAX_TOTAL_SCORE: u8 = MAX_DIMENSION_SCORE * 4;

/// Whether a factor raised or lowered its dimension score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Positive,
    Negative,
}

/// One signal that contributed to a dimension score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Factor {
    /// Human-readable description, without the signed amount.
    pub label: String,
    /// Signed contribution to the dimension score.
    pub delta: i32,
    /// Sign of `delta`, precomputed for renderers.
    pub impact: Impact,
}

impl Factor {
    /// Create a factor; the impact follows the sign of `delta`.
    pub fn new(label: impl Into<String>, delta: i32) -> Self {
        Self {
            label: label.into(),
            delta,
            impact: if delta < 0 {
                Impact::Negative
            } else {
                Impact::Positive
            },
        }
    }

    pub fn is_positive(&self) -> bool {
        self.impact == Impact::Positive
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.delta < 0 {
            write!(f, "{} ({})", self.label, self.delta)
        } else {
            write!(f, "{} (+{})", self.label, self.delta)
        }
    }
}

/// The four fixed scoring dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Is the issue well-specified?
    RequirementClarity,
    /// How contained is the change?
    BlastRadius,
    /// Does this touch critical systems?
    SystemSensitivity,
    /// Can we verify the fix?
    Testability,
}

impl Dimension {
    /// All dimensions in breakdown order.
    pub const ALL: [Dimension; 4] = [
        Dimension::RequirementClarity,
        Dimension::BlastRadius,
        Dimension::SystemSensitivity,
        Dimension::Testability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::RequirementClarity => "requirement_clarity",
            Dimension::BlastRadius => "blast_radius",
            Dimension::SystemSensitivity => "system_sensitivity",
            Dimension::Testability => "testability",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score for a single dimension with the factors that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DimensionScore {
    /// Clamped score (0-25).
    pub score: u8,
    /// Factors in the order they were evaluated.
    pub factors: Vec<Factor>,
}

impl DimensionScore {
    /// Start from a baseline, apply each factor, then clamp to the valid range.
    pub fn from_factors(baseline: i32, factors: Vec<Factor>) -> Self {
        let raw = factors.iter().fold(baseline, |acc, f| acc + f.delta);
        Self {
            score: raw.clamp(0, MAX_DIMENSION_SCORE as i32) as u8,
            factors,
        }
    }
}

/// Breakdown of the confidence score into its four dimensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfidenceBreakdown {
    pub requirement_clarity: DimensionScore,
    pub blast_radius: DimensionScore,
    pub system_sensitivity: DimensionScore,
    pub testability: DimensionScore,
}

impl ConfidenceBreakdown {
    pub fn get(&self, dimension: Dimension) -> &DimensionScore {
        match dimension {
            Dimension::RequirementClarity => &self.requirement_clarity,
            Dimension::BlastRadius => &self.blast_radius,
            Dimension::SystemSensitivity => &self.system_sensitivity,
            Dimension::Testability => &self.testability,
        }
    }

    /// Iterate dimensions with their scores in breakdown order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &DimensionScore)> {
        Dimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

/// Overall confidence that a ticket is safe to remediate automatically.
///
/// Only constructible through [`ConfidenceScore::from_breakdown`], which keeps
/// `total` equal to the sum of the dimension scores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfidenceScore {
    /// Total score (0-100).
    pub total: u8,
    pub breakdown: ConfidenceBreakdown,
}

impl ConfidenceScore {
    pub fn from_breakdown(breakdown: ConfidenceBreakdown) -> Self {
        let total = breakdown.iter().map(|(_, d)| d.score).sum();
        Self { total, breakdown }
    }

    /// Returns true if `total` matches the breakdown and every dimension is in range.
    pub fn is_consistent(&self) -> bool {
        let sum: u32 = self.breakdown.iter().map(|(_, d)| d.score as u32).sum();
        sum == self.total as u32
            && self
                .breakdown
                .iter()
                .all(|(_, d)| d.score <= MAX_DIMENSION_SCORE)
    }
}

/// Scoping output attached to a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Analysis {
    /// Summary of the core problem.
    pub root_issue: String,
    /// Ordered steps to resolve the issue.
    pub action_plan: Vec<String>,
    pub confidence_score: ConfidenceScore,
    pub generated_at: DateTime<Utc>,
}

//! Confidence scorer.
//!
//! Each dimension starts at a baseline and is adjusted by keyword and
//! structure signals found in the issue. Every adjustment is recorded as a
//! [`Factor`] so the result can be audited.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::ticket::Ticket;

use super::types::{ConfidenceBreakdown, ConfidenceScore, DimensionScore, Factor};

const CLARITY_BASELINE: i32 = 10;
const BLAST_RADIUS_BASELINE: i32 = 20;
const SENSITIVITY_BASELINE: i32 = 20;
const TESTABILITY_BASELINE: i32 = 15;

static FILE_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(py|ts|js|tsx|jsx|css|html|rs)\b").unwrap());

pub(crate) static QUOTED_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]+\.(?:py|js|ts|tsx|jsx|css|html|rs))`").unwrap());

static DIRECTORY_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(/[a-zA-Z_]+){2,}").unwrap());

static ERROR_SIGNAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"error|exception|traceback|stack trace").unwrap());

static CODE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"`[a-zA-Z_][a-zA-Z0-9_]*\(`|def [a-zA-Z_]|function [a-zA-Z_]|fn [a-zA-Z_]|class [A-Z]")
        .unwrap()
});

/// Keyword groups that mark a change as touching a sensitive area.
static SENSITIVE_AREAS: Lazy<Vec<(Regex, &'static str, i32)>> = Lazy::new(|| {
    [
        (r"auth|authentication|login|password|token", "authentication", 7),
        (r"payment|billing|stripe|subscription", "payment/billing", 7),
        (r"database|migration|schema", "database/migration", 5),
        (r"delete|remove|drop", "delete/remove operations", 5),
        (r"dependency|package|upgrade", "dependency changes", 3),
        (r"api|endpoint", "API changes", 3),
    ]
    .into_iter()
    .map(|(pattern, area, penalty)| (Regex::new(pattern).unwrap(), area, penalty))
    .collect()
});

const VAGUE_TITLES: [&str; 5] = ["bug", "issue", "fix", "problem", "error"];

/// Score a ticket's current content.
pub fn score(ticket: &Ticket) -> ConfidenceScore {
    score_issue(
        &ticket.title,
        ticket.body.as_deref().unwrap_or(""),
        ticket.labels.iter().map(String::as_str),
    )
}

/// Score raw issue content.
pub fn score_issue<'a>(
    title: &str,
    body: &str,
    labels: impl IntoIterator<Item = &'a str>,
) -> ConfidenceScore {
    let labels: Vec<String> = labels.into_iter().map(|l| l.to_lowercase()).collect();

    ConfidenceScore::from_breakdown(ConfidenceBreakdown {
        requirement_clarity: requirement_clarity(body, title),
        blast_radius: blast_radius(body, &labels),
        system_sensitivity: system_sensitivity(body),
        testability: testability(body),
    })
}

fn requirement_clarity(body: &str, title: &str) -> DimensionScore {
    let mut factors = Vec::new();
    let body_lower = body.to_lowercase();
    let body_len = body.chars().count();

    if body.contains("## Description") || body.contains("## Requirements") {
        factors.push(Factor::new("Has markdown sections", 5));
    }

    if body.contains("## Acceptance Criteria") || body_lower.contains("definition of done") {
        factors.push(Factor::new("Has acceptance criteria", 5));
    }

    if body_len > 200 {
        factors.push(Factor::new("Detailed description", 3));
    }

    if FILE_MENTION.is_match(body) {
        factors.push(Factor::new("Specifies files to modify", 2));
    }

    if body_len < 50 {
        factors.push(Factor::new("Empty or minimal description", -5));
    }

    let title_lower = title.trim().to_lowercase();
    if title.chars().count() < 30 && VAGUE_TITLES.contains(&title_lower.as_str()) {
        factors.push(Factor::new("Vague title", -3));
    }

    DimensionScore::from_factors(CLARITY_BASELINE, factors)
}

fn blast_radius(body: &str, labels: &[String]) -> DimensionScore {
    let mut factors = Vec::new();
    let body_lower = body.to_lowercase();

    let file_count = QUOTED_FILE.find_iter(body).count() as i32;
    if file_count <= 1 {
        factors.push(Factor::new("Single file or no files mentioned", 5));
    } else if file_count > 2 {
        factors.push(Factor::new(
            format!("Multiple files mentioned ({})", file_count),
            -(file_count - 2) * 3,
        ));
    }

    if labels.iter().any(|l| l == "bug" || l == "fix") {
        factors.push(Factor::new("Bug/fix label - usually contained", 3));
    }

    if body_lower.contains("refactor") || body_lower.contains("restructure") {
        factors.push(Factor::new("Contains refactor/restructure", -5));
    }

    if body_lower.contains(" all ") || body_lower.contains(" every ") {
        factors.push(Factor::new("Broad scope (all/every)", -3));
    }

    if DIRECTORY_PATH.find_iter(body).count() > 1 {
        factors.push(Factor::new("Mentions multiple directories", -5));
    }

    DimensionScore::from_factors(BLAST_RADIUS_BASELINE, factors)
}

fn system_sensitivity(body: &str) -> DimensionScore {
    let mut factors = Vec::new();
    let body_lower = body.to_lowercase();

    for (pattern, area, penalty) in SENSITIVE_AREAS.iter() {
        if pattern.is_match(&body_lower) {
            factors.push(Factor::new(format!("Touches {}", area), -penalty));
        }
    }

    if factors.is_empty() {
        factors.push(Factor::new("No critical system keywords", 5));
    }

    if body_lower.contains("non-breaking") || body_lower.contains("backwards compatible") {
        factors.push(Factor::new("Explicitly non-breaking", 3));
    }

    DimensionScore::from_factors(SENSITIVITY_BASELINE, factors)
}

fn testability(body: &str) -> DimensionScore {
    let mut factors = Vec::new();
    let body_lower = body.to_lowercase();

    if ERROR_SIGNAL.is_match(&body_lower) {
        factors.push(Factor::new("Contains error message/stack trace", 5));
    }

    if body_lower.contains("test") {
        factors.push(Factor::new("Mentions testing", 5));
    }

    if body_lower.contains("steps to reproduce") || body_lower.contains("reproduction") {
        factors.push(Factor::new("Has steps to reproduce", 3));
    }

    if CODE_REFERENCE.is_match(body) {
        factors.push(Factor::new("References specific function/class", 2));
    }

    if body_lower.contains("sometimes") || body_lower.contains("intermittent") {
        factors.push(Factor::new("Intermittent issue", -5));
    }

    if body_lower.contains("not sure") || body_lower.contains("might be") {
        factors.push(Factor::new("Uncertainty in description", -3));
    }

    DimensionScore::from_factors(TESTABILITY_BASELINE, factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Dimension;

    fn labels(names: &[&'static str]) -> Vec<&'static str> {
        names.to_vec()
    }

    fn factor_labels(score: &DimensionScore) -> Vec<String> {
        score.factors.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_empty_issue_uses_baselines() {
        let score = score_issue("Something is off", "", labels(&[]));

        assert_eq!(score.breakdown.requirement_clarity.score, 5);
        assert_eq!(
            factor_labels(&score.breakdown.requirement_clarity),
            vec!["Empty or minimal description (-5)"]
        );
        assert_eq!(score.breakdown.blast_radius.score, 25);
        assert_eq!(score.breakdown.system_sensitivity.score, 25);
        assert_eq!(score.breakdown.testability.score, 15);
        assert_eq!(score.total, 70);
        assert!(score.is_consistent());
    }

    #[test]
    fn test_well_specified_issue_scores_high_clarity() {
        let body = "## Description\n\
            The `render_header(` call in `src/header.ts` throws an error when the \
            user has no avatar configured. This is easy to see in the profile page.\n\n\
            ## Steps to reproduce\n1. Open profile\n2. Remove avatar\n\n\
            ## Acceptance Criteria\n- Header renders without avatar\n- A unit test covers it";
        let score = score_issue("Header crashes without avatar", body, labels(&["bug"]));

        let clarity = &score.breakdown.requirement_clarity;
        assert_eq!(clarity.score, 25);
        assert!(factor_labels(clarity).contains(&"Has markdown sections (+5)".to_string()));
        assert!(factor_labels(clarity).contains(&"Has acceptance criteria (+5)".to_string()));

        let testability = &score.breakdown.testability;
        assert!(factor_labels(testability)
            .contains(&"Contains error message/stack trace (+5)".to_string()));
        assert!(factor_labels(testability).contains(&"Has steps to reproduce (+3)".to_string()));
        assert!(factor_labels(testability)
            .contains(&"References specific function/class (+2)".to_string()));
        assert_eq!(testability.score, 25);
    }

    #[test]
    fn test_vague_title_penalized() {
        let score = score_issue("Bug", "short", labels(&[]));
        let clarity = factor_labels(&score.breakdown.requirement_clarity);
        assert!(clarity.contains(&"Vague title (-3)".to_string()));
        assert_eq!(score.breakdown.requirement_clarity.score, 2);
    }

    #[test]
    fn test_many_files_reduce_blast_radius() {
        let body = "Update `a.py`, `b.py`, `c.py` and `d.py` to use the new helper.";
        let score = score_issue("Use helper everywhere", body, labels(&[]));
        let blast = &score.breakdown.blast_radius;
        assert!(factor_labels(blast).contains(&"Multiple files mentioned (4) (-6)".to_string()));
        assert_eq!(blast.score, 14);
    }

    #[test]
    fn test_bug_label_is_case_insensitive() {
        let score = score_issue("Broken link", "The footer link is broken.", labels(&["Bug"]));
        assert!(factor_labels(&score.breakdown.blast_radius)
            .contains(&"Bug/fix label - usually contained (+3)".to_string()));
    }

    #[test]
    fn test_refactor_and_directories_penalized() {
        let body = "Refactor the code under /src/core/ticket and /src/server/api so every module shares it.";
        let score = score_issue("Refactor modules", body, labels(&[]));
        let blast = factor_labels(&score.breakdown.blast_radius);
        assert!(blast.contains(&"Contains refactor/restructure (-5)".to_string()));
        assert!(blast.contains(&"Broad scope (all/every) (-3)".to_string()));
        assert!(blast.contains(&"Mentions multiple directories (-5)".to_string()));
        assert_eq!(score.breakdown.blast_radius.score, 12);
    }

    #[test]
    fn test_sensitive_areas_accumulate() {
        let body = "Login fails after the billing migration ran.";
        let score = score_issue("Login broken", body, labels(&[]));
        let sensitivity = &score.breakdown.system_sensitivity;
        let found = factor_labels(sensitivity);
        assert!(found.contains(&"Touches authentication (-7)".to_string()));
        assert!(found.contains(&"Touches payment/billing (-7)".to_string()));
        assert!(found.contains(&"Touches database/migration (-5)".to_string()));
        assert_eq!(sensitivity.score, 1);
        assert!(sensitivity.factors.iter().all(|f| !f.is_positive()));
    }

    #[test]
    fn test_non_breaking_bonus() {
        let body = "Rename a label in the sidebar. This is a non-breaking cosmetic change.";
        let score = score_issue("Rename sidebar label", body, labels(&[]));
        let found = factor_labels(&score.breakdown.system_sensitivity);
        assert!(found.contains(&"No critical system keywords (+5)".to_string()));
        assert!(found.contains(&"Explicitly non-breaking (+3)".to_string()));
        assert_eq!(score.breakdown.system_sensitivity.score, 25);
    }

    #[test]
    fn test_code_reference_needs_backticked_call() {
        let cited = testability("Calling `save_draft(` twice loses edits.");
        assert!(factor_labels(&cited).contains(&"References specific function/class (+2)".to_string()));

        // An unterminated backtick before a call is not a code reference.
        let loose = testability("Calling `save_draft(draft) twice loses edits.");
        assert!(loose.factors.is_empty());
        assert_eq!(loose.score, 15);

        assert!(CODE_REFERENCE.is_match("def save_draft"));
        assert!(CODE_REFERENCE.is_match("class DraftStore"));
    }

    #[test]
    fn test_uncertainty_lowers_testability() {
        let body = "It sometimes hangs. Not sure why, might be the cache.";
        let score = score_issue("Hang on load", body, labels(&[]));
        let testability = &score.breakdown.testability;
        assert_eq!(testability.score, 7);
    }

    #[test]
    fn test_scores_are_deterministic_and_bounded() {
        let bodies = [
            "",
            "x",
            "auth payment database delete dependency api refactor `a.py` `b.py` `c.py` `d.py` `e.py` `f.py` /a/b /c/d sometimes not sure",
            "## Description\nAll good. ## Acceptance Criteria test error steps to reproduce `f(` non-breaking",
        ];
        for body in bodies {
            let first = score_issue("title", body, labels(&["fix"]));
            let second = score_issue("title", body, labels(&["fix"]));
            assert_eq!(first, second);
            assert!(first.is_consistent());
            for d in Dimension::ALL {
                assert!(first.breakdown.get(d).score <= 25);
            }
            assert!(first.total <= 100);
        }
    }
}

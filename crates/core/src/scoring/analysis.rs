//! Root-issue summary and action-plan extraction.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::ticket::Ticket;

use super::scorer::{self, QUOTED_FILE};
use super::types::Analysis;

const INSUFFICIENT_DETAIL: &str = "Insufficient detail - please add description";
const MAX_SECTION_SUMMARY: usize = 300;
const MAX_PARAGRAPH_SUMMARY: usize = 200;
const MAX_PLAN_ITEMS: usize = 4;

static NUMBERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+\.\s+(.+)$").unwrap());

/// Produce the full analysis for a ticket from its current content.
pub fn analyze(ticket: &Ticket) -> Analysis {
    let body = ticket.body.as_deref().unwrap_or("");
    Analysis {
        root_issue: root_issue(body),
        action_plan: action_plan(body),
        confidence_score: scorer::score(ticket),
        generated_at: Utc::now(),
    }
}

/// Summarize the core problem described in an issue body.
///
/// Prefers the first two sentences of a `## Description` section and falls
/// back to the first paragraph.
pub fn root_issue(body: &str) -> String {
    if body.trim().chars().count() < 10 {
        return INSUFFICIENT_DETAIL.to_string();
    }

    if let Some(section) = description_section(body) {
        let summary = first_sentences(section.trim(), 2);
        if !summary.is_empty() {
            return truncate_chars(&summary, MAX_SECTION_SUMMARY);
        }
    }

    let first_paragraph = body.split("\n\n").next().unwrap_or("").trim();
    let first_paragraph = first_paragraph.trim_start_matches('#').trim_start();
    if !first_paragraph.is_empty() {
        return truncate_chars(first_paragraph, MAX_PARAGRAPH_SUMMARY);
    }

    INSUFFICIENT_DETAIL.to_string()
}

/// Derive an ordered action plan from an issue body.
pub fn action_plan(body: &str) -> Vec<String> {
    let numbered: Vec<String> = NUMBERED_ITEM
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .take(MAX_PLAN_ITEMS)
        .collect();
    if !numbered.is_empty() {
        return numbered;
    }

    let mut plan: Vec<String> = QUOTED_FILE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .take(2)
        .map(|m| format!("Modify {}", m.as_str()))
        .collect();

    plan.push("Implement fix".to_string());
    if body.to_lowercase().contains("test") {
        plan.push("Add/update tests".to_string());
    }
    plan.push("Verify solution".to_string());
    plan
}

/// Text of the `## Description` section (case-insensitive heading), up to the next `##`.
fn description_section(body: &str) -> Option<&str> {
    const HEADING: &str = "## description";
    // ASCII lowering keeps byte offsets aligned with `body`.
    let start = body.to_ascii_lowercase().find(HEADING)?;
    let rest = &body[start + HEADING.len()..];
    // Content starts on the line after the heading.
    let rest = &rest[rest.find('\n')? + 1..];
    let end = rest.find("\n##").unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Join the first `count` sentences, splitting after `.`, `!` or `?` followed by whitespace.
fn first_sentences(text: &str, count: usize) -> String {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_idx, next)) = chars.peek() {
                if next.is_whitespace() {
                    sentences.push(text[start..next_idx].trim());
                    start = next_idx;
                    if sentences.len() == count {
                        break;
                    }
                }
            } else {
                sentences.push(text[start..idx + c.len_utf8()].trim());
                start = text.len();
            }
        }
    }
    if sentences.len() < count && start < text.len() {
        sentences.push(text[start..].trim());
    }

    sentences
        .into_iter()
        .filter(|s| !s.is_empty())
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

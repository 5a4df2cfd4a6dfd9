// evaluator-rs/src/scoring.rs
// Correctness scoring of a ticket against golden expectations.

use civic_agents::Ticket;
use serde::{Deserialize, Serialize};

use crate::golden::Expected;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub department_match: bool,
    pub category_match: bool,
    pub severity_match: bool,
    pub success: bool,
}

/// Rough token count: one token per four characters, rounded up
pub fn token_estimate(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

/// Department is compared case-insensitively, the expected category must be
/// a case-insensitive substring of the actual one, and severity ignores case
/// and surrounding whitespace.
pub fn score_ticket(ticket: &Ticket, expected: &Expected) -> Score {
    let department_match = ticket.department.to_lowercase() == expected.department.to_lowercase();
    let category_match = ticket
        .issue_category
        .to_lowercase()
        .contains(&expected.issue_category.to_lowercase());
    let severity_match = normalize(&ticket.severity) == normalize(&expected.severity);

    Score {
        department_match,
        category_match,
        severity_match,
        success: department_match && category_match && severity_match,
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

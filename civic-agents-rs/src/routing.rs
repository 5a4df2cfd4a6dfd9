// civic-agents-rs/src/routing.rs
// Department routing and priority rules applied after classification.

use crate::model::Priority;

/// Public reporting form for issues without a dedicated intake channel
pub const PUBLIC_FORM_URL: &str = "https://city.gov/forms/general-report";

/// Marker for departments that take reports without a form
pub const NO_FORM: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepartmentRoute {
    pub department: &'static str,
    pub form_url: &'static str,
}

/// Route a lower-cased issue category to its department and form URL
pub fn route_department(issue_category: &str) -> DepartmentRoute {
    match issue_category {
        "pothole" => DepartmentRoute {
            department: "public works",
            form_url: NO_FORM,
        },
        "streetlight_outage" => DepartmentRoute {
            department: "street lighting",
            form_url: PUBLIC_FORM_URL,
        },
        "garbage_overflow" => DepartmentRoute {
            department: "sanitation",
            form_url: NO_FORM,
        },
        _ => DepartmentRoute {
            department: "general services",
            form_url: PUBLIC_FORM_URL,
        },
    }
}

/// Priority from severity and an optional match score.
///
/// `high` when severity is high or score >= 7; `medium` when severity is
/// medium or 4 <= score < 7; otherwise `low`.
pub fn determine_priority(severity: &str, match_score: Option<u32>) -> Priority {
    let severity = severity.trim().to_lowercase();
    let score = match_score.unwrap_or(0);

    if severity == "high" || score >= 7 {
        Priority::High
    } else if severity == "medium" || (4..7).contains(&score) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

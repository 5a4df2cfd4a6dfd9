// civic-agents-rs/src/classifier.rs
// Deterministic keyword classification of complaint text.

use crate::model::{ClassificationResult, SeverityHint};

/// Strategy interface for the research stage.
///
/// Implementations must be side-effect free and must not fail.
pub trait IssueClassifier: Send + Sync {
    fn classify(&self, description: &str) -> ClassificationResult;
}

#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub keywords: Vec<&'static str>,
    pub issue_category: &'static str,
    pub department: &'static str,
    pub severity: SeverityHint,
}

impl KeywordRule {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }

    fn result(&self) -> ClassificationResult {
        ClassificationResult {
            issue_category: self.issue_category.to_string(),
            department: self.department.to_string(),
            severity_hint: self.severity,
        }
    }
}

/// Ordered keyword rules over the lower-cased description; first match wins.
#[derive(Debug, Clone)]
pub struct HeuristicIssueClassifier {
    rules: Vec<KeywordRule>,
    fallback: KeywordRule,
}

impl Default for HeuristicIssueClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                KeywordRule {
                    keywords: vec!["pothole", "road damage"],
                    issue_category: "Pothole",
                    department: "Public Works",
                    severity: SeverityHint::High,
                },
                KeywordRule {
                    keywords: vec!["streetlight", "light out", "lamp"],
                    issue_category: "streetlight_outage",
                    department: "Street Lighting",
                    severity: SeverityHint::Medium,
                },
                KeywordRule {
                    keywords: vec!["garbage", "trash", "waste", "overflow"],
                    issue_category: "garbage_overflow",
                    department: "Sanitation",
                    severity: SeverityHint::Low,
                },
            ],
            fallback: KeywordRule {
                keywords: Vec::new(),
                issue_category: "general_issue",
                department: "General Services",
                severity: SeverityHint::Medium,
            },
        }
    }
}

impl HeuristicIssueClassifier {
    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }
}

impl IssueClassifier for HeuristicIssueClassifier {
    fn classify(&self, description: &str) -> ClassificationResult {
        let lowered = description.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .unwrap_or(&self.fallback)
            .result()
    }
}

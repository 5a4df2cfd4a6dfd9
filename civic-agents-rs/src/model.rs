// civic-agents-rs/src/model.rs
// Typed records passed between the pipeline stages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse severity assigned by the rule classifier.
///
/// Rendered capitalized (`Low`, `Medium`, `High`), which is also how it
/// lands in tickets unless the model overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeverityHint {
    Low,
    Medium,
    High,
}

impl SeverityHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityHint::Low => "Low",
            SeverityHint::Medium => "Medium",
            SeverityHint::High => "High",
        }
    }
}

impl fmt::Display for SeverityHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub issue_category: String,
    pub department: String,
    pub severity_hint: SeverityHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceQuality {
    Good,
    Moderate,
    Poor,
}

impl EvidenceQuality {
    /// Case-insensitive parse; unknown labels yield `None`
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "good" => Some(EvidenceQuality::Good),
            "moderate" => Some(EvidenceQuality::Moderate),
            "poor" => Some(EvidenceQuality::Poor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceQuality::Good => "good",
            EvidenceQuality::Moderate => "moderate",
            EvidenceQuality::Poor => "poor",
        }
    }
}

/// Vision model assessment. Every key is optional: model output is not
/// guaranteed to follow the schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_quality: Option<EvidenceQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl EvidenceAssessment {
    /// Lenient extraction from a JSON object; wrong-typed keys are dropped
    pub fn from_value(value: &Value) -> Self {
        Self {
            issue_category: non_empty_str(value, "issue_category"),
            severity: non_empty_str(value, "severity"),
            evidence_quality: value
                .get("evidence_quality")
                .and_then(Value::as_str)
                .and_then(EvidenceQuality::from_label),
            summary: non_empty_str(value, "summary"),
        }
    }
}

/// Output of the evidence stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvidenceOutcome {
    Assessed(EvidenceAssessment),
    Unparsed { error: String, raw: String },
}

impl EvidenceOutcome {
    pub fn summary(&self) -> Option<&str> {
        match self {
            EvidenceOutcome::Assessed(a) => a.summary.as_deref(),
            EvidenceOutcome::Unparsed { .. } => None,
        }
    }

    pub fn evidence_quality(&self) -> Option<EvidenceQuality> {
        match self {
            EvidenceOutcome::Assessed(a) => a.evidence_quality,
            EvidenceOutcome::Unparsed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Case-insensitive parse of `low`/`medium`/`high`
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// The generative ticket-assembly output; the model may fill any subset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketDraft {
    pub ticket_id: Option<String>,
    pub location: Option<String>,
    pub issue_category: Option<String>,
    pub department: Option<String>,
    pub severity: Option<String>,
    pub evidence_quality: Option<String>,
    pub summary: Option<String>,
    pub form_url: Option<String>,
    pub actions: Option<Vec<String>>,
    pub priority: Option<String>,
}

impl TicketDraft {
    /// Lenient extraction. Blank strings count as absent; non-string
    /// action entries are skipped and an empty action list is absent.
    pub fn from_value(value: &Value) -> Self {
        let actions = value.get("actions").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        Self {
            ticket_id: non_empty_str(value, "ticket_id"),
            location: non_empty_str(value, "location"),
            issue_category: non_empty_str(value, "issue_category"),
            department: non_empty_str(value, "department"),
            severity: non_empty_str(value, "severity"),
            evidence_quality: non_empty_str(value, "evidence_quality"),
            summary: non_empty_str(value, "summary"),
            form_url: non_empty_str(value, "form_url"),
            actions: actions.filter(|a| !a.is_empty()),
            priority: non_empty_str(value, "priority"),
        }
    }
}

/// Final municipal ticket; every field is always populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub location: String,
    pub issue_category: String,
    pub department: String,
    pub severity: String,
    pub evidence_quality: String,
    pub summary: String,
    pub form_url: String,
    pub actions: Vec<String>,
    pub priority: Priority,
}

/// Memory record stored under `submitted_ticket` for each created ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedTicketMemory {
    pub ticket_id: String,
    pub user_id: String,
    pub location: String,
    pub issue_category: String,
    pub severity: String,
    pub created_at: DateTime<Utc>,
}

/// Session events emitted by the synthesizer, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Research { result: ClassificationResult },
    Evidence { result: EvidenceOutcome },
    TicketCreated { ticket: Ticket },
}

impl PipelineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::Research { .. } => "research",
            PipelineEvent::Evidence { .. } => "evidence",
            PipelineEvent::TicketCreated { .. } => "ticket_created",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRequest {
    pub user_id: String,
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub image_paths: Vec<String>,
    /// Continue an existing session instead of opening a new one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl TicketRequest {
    pub fn new(user_id: impl Into<String>, location: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            location: location.into(),
            description: description.into(),
            image_paths: Vec::new(),
            session_id: None,
        }
    }

    pub fn with_images(mut self, image_paths: Vec<String>) -> Self {
        self.image_paths = image_paths;
        self
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketResponse {
    pub session_id: String,
    pub ticket: Ticket,
    /// Wall-clock seconds spent in `create_ticket`
    pub elapsed: f64,
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draft_ignores_blank_and_mistyped_fields() {
        let draft = TicketDraft::from_value(&json!({
            "ticket_id": "  ",
            "department": 42,
            "summary": " Broken lamp ",
            "actions": ["", 7, "Call crew"],
            "priority": "HIGH"
        }));

        assert_eq!(draft.ticket_id, None);
        assert_eq!(draft.department, None);
        assert_eq!(draft.summary.as_deref(), Some("Broken lamp"));
        assert_eq!(draft.actions, Some(vec!["Call crew".to_string()]));
        assert_eq!(draft.priority.as_deref().and_then(Priority::parse), Some(Priority::High));
    }

    #[test]
    fn empty_action_list_is_absent() {
        let draft = TicketDraft::from_value(&json!({"actions": []}));
        assert_eq!(draft.actions, None);
    }

    #[test]
    fn assessment_parses_quality_leniently() {
        let a = EvidenceAssessment::from_value(&json!({
            "evidence_quality": "Moderate",
            "severity": "high",
            "summary": "Crater in lane"
        }));
        assert_eq!(a.evidence_quality, Some(EvidenceQuality::Moderate));
        assert_eq!(a.issue_category, None);

        let b = EvidenceAssessment::from_value(&json!({"evidence_quality": "excellent"}));
        assert_eq!(b.evidence_quality, None);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = PipelineEvent::Research {
            result: ClassificationResult {
                issue_category: "Pothole".into(),
                department: "Public Works".into(),
                severity_hint: SeverityHint::High,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "research");
        assert_eq!(value["result"]["severity_hint"], "High");
        assert_eq!(event.kind(), "research");

        let evidence = PipelineEvent::Evidence {
            result: EvidenceOutcome::Unparsed {
                error: "Failed to parse JSON output".into(),
                raw: "oops".into(),
            },
        };
        let value = serde_json::to_value(&evidence).unwrap();
        assert_eq!(value["type"], "evidence");
        assert_eq!(value["result"]["status"], "unparsed");
        assert_eq!(value["result"]["raw"], "oops");
    }

    #[test]
    fn request_defaults_optional_fields() {
        let req: TicketRequest = serde_json::from_value(json!({
            "user_id": "u1",
            "location": "Main St",
            "description": "pothole"
        }))
        .unwrap();
        assert!(req.image_paths.is_empty());
        assert!(req.session_id.is_none());
    }
}

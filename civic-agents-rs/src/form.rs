// civic-agents-rs/src/form.rs
// Municipal incident form assembly and simulated submission.

use std::sync::Arc;

use chrono::Utc;
use llm_sdk::GenerativeBackend;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{short_id, Result};

pub const REQUIRED_FIELDS: [&str; 4] = ["issue_category", "severity", "location", "summary"];

pub const OPTIONAL_FIELDS: [&str; 4] = ["department", "evidence_quality", "attachments", "priority"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldProblem {
    /// Key not present at all
    Absent,
    /// Present but null, `""` or `[]`
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub problem: FieldProblem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormPayload {
    pub form_id: String,
    pub submitted_at: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendReceipt {
    pub status: String,
    pub form_id: String,
    pub received_at: String,
    pub backend_reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    pub success: bool,
    pub missing_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_issues: Vec<FieldIssue>,
    pub form_payload: FormPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendReceipt>,
    pub message: String,
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Required fields that are absent or empty, in declaration order
pub fn validate_fields(record: &Map<String, Value>) -> Vec<FieldIssue> {
    REQUIRED_FIELDS
        .iter()
        .filter_map(|&field| {
            let problem = match record.get(field) {
                None => FieldProblem::Absent,
                Some(v) if is_empty_value(v) => FieldProblem::Empty,
                Some(_) => return None,
            };
            Some(FieldIssue {
                field: field.to_string(),
                problem,
            })
        })
        .collect()
}

/// Required fields always appear (null when missing); optional fields only
/// when present in `record`.
pub fn build_form_payload(record: &Map<String, Value>) -> FormPayload {
    let mut fields = Map::new();
    for field in REQUIRED_FIELDS {
        fields.insert(field.to_string(), record.get(field).cloned().unwrap_or(Value::Null));
    }
    for field in OPTIONAL_FIELDS {
        if let Some(value) = record.get(field) {
            fields.insert(field.to_string(), value.clone());
        }
    }

    FormPayload {
        form_id: short_id("FORM-", 8),
        submitted_at: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
        fields,
    }
}

/// Stand-in for the city intake backend
pub fn simulate_submission(payload: &FormPayload) -> BackendReceipt {
    BackendReceipt {
        status: "submitted".to_string(),
        form_id: payload.form_id.clone(),
        received_at: payload.submitted_at.clone(),
        backend_reference: short_id("BK-", 6),
    }
}

pub struct FormAgent {
    backend: Arc<dyn GenerativeBackend>,
}

impl FormAgent {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    /// Validate, assemble and (when complete) submit the form.
    ///
    /// Missing fields are reported in the result rather than raised; only
    /// backend failures while writing the message are errors.
    pub async fn submit_form(&self, record: &Map<String, Value>) -> Result<FormSubmission> {
        let field_issues = validate_fields(record);
        let missing_fields: Vec<String> = field_issues.iter().map(|i| i.field.clone()).collect();
        let form_payload = build_form_payload(record);

        let backend = if missing_fields.is_empty() {
            Some(simulate_submission(&form_payload))
        } else {
            tracing::info!(missing = ?missing_fields, "form submission incomplete");
            None
        };

        let message = self.confirmation_message(&form_payload, &missing_fields).await?;

        Ok(FormSubmission {
            success: backend.is_some(),
            missing_fields,
            field_issues,
            form_payload,
            backend,
            message,
        })
    }

    /// Submit a serialized record; non-object values are treated as empty
    pub async fn submit_value(&self, record: &Value) -> Result<FormSubmission> {
        let empty = Map::new();
        self.submit_form(record.as_object().unwrap_or(&empty)).await
    }

    async fn confirmation_message(&self, payload: &FormPayload, missing: &[String]) -> Result<String> {
        let prompt = if missing.is_empty() {
            format!(
                "A municipal incident report form has been successfully prepared. \
                 Create a concise confirmation message summarizing the incident using:\n{}",
                Value::Object(payload.fields.clone())
            )
        } else {
            format!(
                "A municipal incident form submission was attempted but missing fields \
                 {:?}. Generate a short, helpful message to the user explaining what is missing.",
                missing
            )
        };

        let text = self.backend.generate_text(&prompt, 0.0).await?;
        Ok(text.trim().to_string())
    }
}

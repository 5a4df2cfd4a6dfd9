// civic-agents-rs/src/synthesizer.rs
// Ticket synthesis: runs research and evidence, merges their output with a
// model-drafted ticket, and records the trajectory in session and memory.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use llm_sdk::GenerativeBackend;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use session_store::{KeyedLocks, MemoryStore, SessionStore, StoreError};
use tracing::instrument;

use crate::classifier::{HeuristicIssueClassifier, IssueClassifier};
use crate::evidence::{EvidenceAnalyzer, EvidenceSchema};
use crate::model::{
    EvidenceOutcome, PipelineEvent, Priority, SubmittedTicketMemory, Ticket, TicketDraft, TicketRequest,
    TicketResponse,
};
use crate::routing::{determine_priority, route_department};
use crate::trace::{self, NoopSpanSink, SpanSink, TraceSpan};
use crate::{short_id, Result};

/// Memory key for tickets a user has submitted
pub const SUBMITTED_TICKET_KEY: &str = "submitted_ticket";

const UNKNOWN_QUALITY: &str = "unknown";

/// JSON schema for the model-drafted ticket
pub static TICKET_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "ticket_id": {"type": "string"},
            "location": {"type": "string"},
            "issue_category": {"type": "string"},
            "department": {"type": "string"},
            "severity": {"type": "string"},
            "evidence_quality": {"type": "string"},
            "summary": {"type": "string"},
            "form_url": {"type": "string"},
            "actions": {"type": "array", "items": {"type": "string"}},
            "priority": {"type": "string"}
        },
        "required": ["ticket_id", "location", "issue_category", "department", "severity", "summary"]
    })
});

/// Deterministically computed ticket fields, used wherever the draft is silent
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedFields {
    pub location: String,
    pub issue_category: String,
    pub department: String,
    pub severity: String,
    pub evidence_quality: Option<String>,
    pub summary: String,
    pub form_url: String,
}

/// Field-by-field merge: draft value, else computed value, else default.
///
/// `issue_category` is lower-cased after the merge. Priority comes from the
/// draft only when it is a valid level.
pub fn merge_ticket(draft: TicketDraft, computed: ComputedFields, match_score: Option<u32>) -> Ticket {
    let form_url = draft.form_url.unwrap_or(computed.form_url);
    let severity = draft.severity.unwrap_or(computed.severity);

    let actions = draft.actions.unwrap_or_else(|| {
        vec![
            format!("Submit report via {}", form_url),
            "Attach images and summary".to_string(),
        ]
    });

    let priority = draft
        .priority
        .as_deref()
        .and_then(Priority::parse)
        .unwrap_or_else(|| determine_priority(&severity, match_score));

    Ticket {
        ticket_id: draft.ticket_id.unwrap_or_else(|| short_id("TKT-", 8)),
        location: draft.location.unwrap_or(computed.location),
        issue_category: draft
            .issue_category
            .unwrap_or(computed.issue_category)
            .to_lowercase(),
        department: draft.department.unwrap_or(computed.department),
        evidence_quality: draft
            .evidence_quality
            .or(computed.evidence_quality)
            .unwrap_or_else(|| UNKNOWN_QUALITY.to_string()),
        summary: draft.summary.unwrap_or(computed.summary),
        severity,
        form_url,
        actions,
        priority,
    }
}

fn compute_fields(
    request: &TicketRequest,
    classified_category: &str,
    severity: &str,
    evidence: &EvidenceOutcome,
) -> ComputedFields {
    let issue_category = classified_category.to_lowercase();
    let route = route_department(&issue_category);

    ComputedFields {
        location: request.location.clone(),
        department: route.department.to_string(),
        form_url: route.form_url.to_string(),
        severity: severity.to_string(),
        evidence_quality: evidence.evidence_quality().map(|q| q.as_str().to_string()),
        summary: evidence
            .summary()
            .map(str::to_string)
            .unwrap_or_else(|| request.description.clone()),
        issue_category,
    }
}

fn ticket_prompt(request: &TicketRequest, computed: &ComputedFields) -> String {
    format!(
        "Create a short civic ticket summary and a prioritized list of actionable next steps.\n\n\
         Context:\n- Location: {}\n- Issue Category: {}\n\
         - Department: {}\n- Severity: {}\n\
         - Evidence Quality: {}\n\
         - Description: {}\n- Evidence Summary: {}\n\n\
         Return a strict JSON object matching the schema and recommend 2-4 concise actions.",
        request.location,
        computed.issue_category,
        computed.department,
        computed.severity,
        computed.evidence_quality.as_deref().unwrap_or(UNKNOWN_QUALITY),
        request.description,
        computed.summary,
    )
}

/// Orchestrates the research, evidence and ticket-assembly stages.
///
/// Stages run strictly in sequence. Requests for the same user, and for the
/// same session, are serialized; unrelated requests run concurrently.
pub struct TicketSynthesizer {
    classifier: Arc<dyn IssueClassifier>,
    evidence: EvidenceAnalyzer,
    backend: Arc<dyn GenerativeBackend>,
    sessions: Arc<SessionStore<PipelineEvent>>,
    memory: Arc<MemoryStore>,
    spans: Arc<dyn SpanSink>,
    user_locks: KeyedLocks,
    session_locks: KeyedLocks,
}

impl TicketSynthesizer {
    /// Synthesizer with the heuristic classifier and volatile stores
    pub fn new(backend: Arc<dyn GenerativeBackend>, evidence_schema: EvidenceSchema) -> Self {
        Self {
            classifier: Arc::new(HeuristicIssueClassifier::default()),
            evidence: EvidenceAnalyzer::new(Arc::clone(&backend), evidence_schema),
            backend,
            sessions: Arc::new(SessionStore::new()),
            memory: Arc::new(MemoryStore::new()),
            spans: Arc::new(NoopSpanSink),
            user_locks: KeyedLocks::new(),
            session_locks: KeyedLocks::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IssueClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionStore<PipelineEvent>>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_memory(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = memory;
        self
    }

    /// Send orchestrator and evidence spans to `spans`
    pub fn with_span_sink(mut self, spans: Arc<dyn SpanSink>) -> Self {
        self.evidence = self.evidence.with_span_sink(Arc::clone(&spans));
        self.spans = spans;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore<PipelineEvent>> {
        &self.sessions
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn backend(&self) -> &Arc<dyn GenerativeBackend> {
        &self.backend
    }

    /// Turn a complaint into a ticket.
    ///
    /// Opens a session unless `request.session_id` names an existing one
    /// (an unknown id is an error, a blank one opens a new session). Emits `research`, `evidence` and
    /// `ticket_created` events in that order and stores a
    /// [`SubmittedTicketMemory`] for the user.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, session_id = tracing::field::Empty))]
    pub async fn create_ticket(&self, request: TicketRequest) -> Result<TicketResponse> {
        let started = Instant::now();
        let mut span = TraceSpan::new("orchestrator.create_ticket");

        let _user_guard = self.user_locks.lock(&request.user_id).await;

        let requested = request.session_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
        let session_id = match requested {
            Some(id) => {
                if !self.sessions.exists(id).await {
                    return Err(StoreError::SessionNotFound(id.to_string()).into());
                }
                id.to_string()
            }
            None => self.sessions.new_session(&request.user_id).await?,
        };
        let _session_guard = self.session_locks.lock(&session_id).await;
        tracing::Span::current().record("session_id", session_id.as_str());
        span.log(json!({"event": "session_resolved", "session_id": &session_id, "user_id": &request.user_id}));

        let research = self.classifier.classify(&request.description);
        tracing::info!(issue_category = %research.issue_category, "research complete");
        span.log(json!({"action": "research", "research_out": &research}));
        self.sessions
            .append_event(&session_id, PipelineEvent::Research { result: research.clone() })
            .await?;

        let evidence = self
            .evidence
            .analyze_evidence(&request.description, &request.image_paths)
            .await?;
        span.log(json!({"action": "evidence", "evidence_out": &evidence}));
        self.sessions
            .append_event(&session_id, PipelineEvent::Evidence { result: evidence.clone() })
            .await?;

        let computed = compute_fields(&request, &research.issue_category, research.severity_hint.as_str(), &evidence);

        let draft_response = self
            .backend
            .generate_structured(&ticket_prompt(&request, &computed), &TICKET_SCHEMA)
            .await?;
        span.log(json!({"action": "llm_ticket_struct", "ticket_struct": &draft_response}));
        let draft = draft_response
            .value()
            .map(TicketDraft::from_value)
            .unwrap_or_default();

        // no match score exists in this flow; priority derives from severity
        let ticket = merge_ticket(draft, computed, None);

        let memory_record = SubmittedTicketMemory {
            ticket_id: ticket.ticket_id.clone(),
            user_id: request.user_id.clone(),
            location: ticket.location.clone(),
            issue_category: ticket.issue_category.clone(),
            severity: ticket.severity.clone(),
            created_at: Utc::now(),
        };
        self.memory
            .remember(&request.user_id, SUBMITTED_TICKET_KEY, &memory_record)
            .await?;
        self.sessions
            .append_event(&session_id, PipelineEvent::TicketCreated { ticket: ticket.clone() })
            .await?;

        tracing::info!(
            ticket_id = %ticket.ticket_id,
            department = %ticket.department,
            priority = ?ticket.priority,
            "ticket created"
        );
        span.log(json!({"result": &ticket}));
        trace::emit(self.spans.as_ref(), span).await;

        Ok(TicketResponse {
            session_id,
            ticket,
            elapsed: started.elapsed().as_secs_f64(),
        })
    }
}

// civic-agents-rs/src/tests/mod.rs
// Pipeline tests against scripted and mocked generative backends.

use std::sync::Arc;

use async_trait::async_trait;
use llm_sdk::{BackendCall, CannedBackend, GenerativeBackend, ImagePart, ServiceError, StructuredResponse};
use mockall::mock;
use mockall::predicate;
use serde_json::{json, Value};
use session_store::{Event, MemoryEntry, MemoryStore, NdjsonLog, SessionInfo, SessionStore, StoreError};
use tempfile::tempdir;

use crate::comms::{CommsAgent, SMS_MAX_CHARS};
use crate::evidence::{EvidenceAnalyzer, EvidenceSchema};
use crate::form::FormAgent;
use crate::model::{EvidenceOutcome, PipelineEvent, Priority, SubmittedTicketMemory, TicketRequest};
use crate::synthesizer::{TicketSynthesizer, SUBMITTED_TICKET_KEY};
use crate::trace::{NdjsonSpanWriter, TraceSpan};
use crate::PipelineError;

mock! {
    pub Backend {}

    #[async_trait]
    impl GenerativeBackend for Backend {
        fn name(&self) -> &str;
        async fn generate_text(&self, prompt: &str, temperature: f32) -> llm_sdk::Result<String>;
        async fn generate_structured(&self, prompt: &str, schema: &Value) -> llm_sdk::Result<StructuredResponse>;
        async fn generate_structured_vision(
            &self,
            prompt: &str,
            text_input: &str,
            images: &[ImagePart],
            schema: &Value,
        ) -> llm_sdk::Result<StructuredResponse>;
    }
}

fn synthesizer(backend: &Arc<CannedBackend>) -> TicketSynthesizer {
    TicketSynthesizer::new(backend.clone(), EvidenceSchema::bundled().unwrap())
}

async fn event_kinds(synth: &TicketSynthesizer, session_id: &str) -> Vec<&'static str> {
    synth
        .sessions()
        .events(session_id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.event.kind())
        .collect()
}

fn pothole_request() -> TicketRequest {
    TicketRequest::new("user-1", "Main St & 5th", "There is a huge pothole blocking the right lane")
}

#[tokio::test]
async fn pothole_with_empty_draft_uses_computed_fields() {
    let backend = Arc::new(CannedBackend::new());
    let synth = synthesizer(&backend);

    let response = synth.create_ticket(pothole_request()).await.unwrap();
    let ticket = &response.ticket;

    assert_eq!(ticket.issue_category, "pothole");
    assert_eq!(ticket.department, "public works");
    assert_eq!(ticket.severity, "High");
    assert_eq!(ticket.priority, Priority::High);
    assert_eq!(ticket.location, "Main St & 5th");
    assert_eq!(ticket.form_url, "N/A");
    assert_eq!(ticket.evidence_quality, "unknown");
    assert_eq!(ticket.summary, "There is a huge pothole blocking the right lane");
    assert_eq!(ticket.actions.len(), 2);
    assert!(ticket.ticket_id.starts_with("TKT-"));
    assert!(response.elapsed >= 0.0);

    assert_eq!(
        event_kinds(&synth, &response.session_id).await,
        vec!["research", "evidence", "ticket_created"]
    );

    let memories = synth.memory().query_memory("user-1", SUBMITTED_TICKET_KEY).await.unwrap();
    assert_eq!(memories.len(), 1);
    let stored: SubmittedTicketMemory = memories[0].decode().unwrap();
    assert_eq!(stored.ticket_id, ticket.ticket_id);
    assert_eq!(stored.issue_category, "pothole");
    assert_eq!(stored.severity, "High");
}

#[tokio::test]
async fn evidence_and_draft_values_flow_into_ticket() {
    let backend = Arc::new(CannedBackend::new());
    backend.push_vision_json(json!({
        "issue_category": "pothole",
        "severity": "high",
        "evidence_quality": "good",
        "summary": "  Deep pothole, about 30cm wide  "
    }));
    backend.push_structured_json(json!({
        "ticket_id": "TKT-fromllm",
        "actions": ["Cone off the lane", "Schedule patching"],
        "priority": "medium"
    }));
    let synth = synthesizer(&backend);

    let ticket = synth.create_ticket(pothole_request()).await.unwrap().ticket;

    assert_eq!(ticket.ticket_id, "TKT-fromllm");
    assert_eq!(ticket.summary, "Deep pothole, about 30cm wide");
    assert_eq!(ticket.evidence_quality, "good");
    assert_eq!(ticket.actions, vec!["Cone off the lane", "Schedule patching"]);
    assert_eq!(ticket.priority, Priority::Medium);

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    match &calls[1] {
        BackendCall::Structured { prompt, schema } => {
            assert!(prompt.contains("- Department: public works"));
            assert!(prompt.contains("- Evidence Quality: good"));
            assert_eq!(schema["type"], "object");
        }
        other => panic!("expected structured call, got {:?}", other),
    }
}

#[tokio::test]
async fn unparsed_evidence_falls_back_to_description() {
    let backend = Arc::new(CannedBackend::new());
    backend.push_vision(Ok(StructuredResponse::unparsed("the photo shows a road")));
    let synth = synthesizer(&backend);

    let response = synth
        .create_ticket(TicketRequest::new("user-2", "Elm Ave", "Streetlight is out again"))
        .await
        .unwrap();

    assert_eq!(response.ticket.summary, "Streetlight is out again");
    assert_eq!(response.ticket.department, "street lighting");
    assert_eq!(response.ticket.priority, Priority::Medium);

    let events = synth.sessions().events(&response.session_id).await.unwrap();
    match &events[1].event {
        PipelineEvent::Evidence {
            result: EvidenceOutcome::Unparsed { raw, .. },
        } => assert_eq!(raw, "the photo shows a road"),
        other => panic!("expected unparsed evidence, got {:?}", other),
    }
}

#[tokio::test]
async fn non_object_evidence_is_unparsed() {
    let backend = Arc::new(CannedBackend::new());
    backend.push_vision_json(json!([1, 2]));
    let analyzer = EvidenceAnalyzer::new(backend.clone(), EvidenceSchema::bundled().unwrap());

    let outcome = analyzer.analyze_evidence("trash everywhere", &[]).await.unwrap();
    assert_eq!(
        outcome,
        EvidenceOutcome::Unparsed {
            error: llm_sdk::core::PARSE_FAILURE.to_string(),
            raw: "[1,2]".to_string(),
        }
    );
}

#[tokio::test]
async fn images_are_sent_inline_with_guessed_mime_type() {
    let dir = tempdir().unwrap();
    let photo = dir.path().join("hole.PNG");
    std::fs::write(&photo, b"hello").unwrap();

    let backend = Arc::new(CannedBackend::new());
    let synth = synthesizer(&backend);
    let request = pothole_request().with_images(vec![photo.to_string_lossy().into_owned()]);
    synth.create_ticket(request).await.unwrap();

    match &backend.calls()[0] {
        BackendCall::Vision { text_input, images, .. } => {
            assert_eq!(text_input, "There is a huge pothole blocking the right lane");
            assert_eq!(
                images,
                &vec![ImagePart {
                    mime_type: "image/png".into(),
                    data: "aGVsbG8=".into()
                }]
            );
        }
        other => panic!("expected vision call, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_image_fails_before_any_ticket_is_recorded() {
    let backend = Arc::new(CannedBackend::new());
    let synth = synthesizer(&backend);
    let request = pothole_request().with_images(vec!["/definitely/not/here.jpg".into()]);

    let err = synth.create_ticket(request).await.unwrap_err();
    assert!(matches!(err, PipelineError::ImageRead { ref path, .. } if path == "/definitely/not/here.jpg"));
    assert!(backend.calls().is_empty());

    let sessions = synth.sessions().list_sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(event_kinds(&synth, &sessions[0]).await, vec!["research"]);
    assert!(synth
        .memory()
        .query_memory("user-1", SUBMITTED_TICKET_KEY)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unknown_session_is_rejected_without_backend_calls() {
    let backend = Arc::new(CannedBackend::new());
    let synth = synthesizer(&backend);

    let err = synth
        .create_ticket(pothole_request().in_session("no-such-session"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Store(StoreError::SessionNotFound(ref id)) if id == "no-such-session"));
    assert!(backend.calls().is_empty());
    assert!(synth.sessions().list_sessions().await.is_empty());
}

#[tokio::test]
async fn blank_session_id_opens_a_new_session() {
    let backend = Arc::new(CannedBackend::new());
    let synth = synthesizer(&backend);

    let empty = synth.create_ticket(pothole_request().in_session("")).await.unwrap();
    let spaces = synth.create_ticket(pothole_request().in_session("   ")).await.unwrap();

    assert_ne!(empty.session_id, spaces.session_id);
    assert!(!empty.session_id.trim().is_empty());
    assert_eq!(synth.sessions().list_sessions().await, vec![empty.session_id, spaces.session_id]);
}

#[tokio::test]
async fn same_complaint_from_two_users_routes_identically() {
    let backend = Arc::new(CannedBackend::new());
    let synth = synthesizer(&backend);
    let description = "There is a huge pothole blocking the right lane";

    let first = synth
        .create_ticket(TicketRequest::new("alice", "Main St & 5th", description))
        .await
        .unwrap();
    let second = synth
        .create_ticket(TicketRequest::new("bob", "Main St & 5th", description))
        .await
        .unwrap();

    assert_eq!(first.ticket.issue_category, second.ticket.issue_category);
    assert_eq!(first.ticket.department, second.ticket.department);
    assert_eq!(first.ticket.severity, second.ticket.severity);
    assert_ne!(first.ticket.ticket_id, second.ticket.ticket_id);
    assert_ne!(first.session_id, second.session_id);
}

#[tokio::test]
async fn existing_session_accumulates_events() {
    let backend = Arc::new(CannedBackend::new());
    let synth = synthesizer(&backend);

    let first = synth.create_ticket(pothole_request()).await.unwrap();
    let second = synth
        .create_ticket(
            TicketRequest::new("user-1", "Main St & 5th", "Garbage bins overflowing").in_session(&first.session_id),
        )
        .await
        .unwrap();

    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.ticket.department, "sanitation");
    assert_eq!(second.ticket.priority, Priority::Low);
    assert_eq!(synth.sessions().list_sessions().await.len(), 1);
    assert_eq!(event_kinds(&synth, &first.session_id).await.len(), 6);
    assert_eq!(
        synth.memory().query_memory("user-1", SUBMITTED_TICKET_KEY).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn concurrent_requests_for_one_user_all_complete() {
    let backend = Arc::new(CannedBackend::new());
    let synth = Arc::new(synthesizer(&backend));

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let synth = Arc::clone(&synth);
            tokio::spawn(async move {
                synth
                    .create_ticket(TicketRequest::new("busy-user", format!("Block {}", i), "pothole"))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(event_kinds(&synth, &response.session_id).await.len(), 3);
    }

    assert_eq!(synth.sessions().list_sessions().await.len(), 5);
    assert_eq!(
        synth.memory().query_memory("busy-user", SUBMITTED_TICKET_KEY).await.unwrap().len(),
        5
    );
}

#[tokio::test]
async fn spans_are_written_as_ndjson() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("obs").join("spans.ndjson");

    let backend = Arc::new(CannedBackend::new());
    let synth = synthesizer(&backend).with_span_sink(Arc::new(NdjsonSpanWriter::new(&path)));
    synth.create_ticket(pothole_request()).await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let spans: Vec<TraceSpan> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].name, "evidence.analyze");
    assert_eq!(spans[1].name, "orchestrator.create_ticket");
    assert!(spans.iter().all(|s| s.finished_at.is_some() && s.duration_ms.is_some()));
    assert!(spans[1].logs.iter().any(|l| l.fields["action"] == "llm_ticket_struct"));
}

#[tokio::test]
async fn span_write_failure_does_not_fail_the_ticket() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();

    let backend = Arc::new(CannedBackend::new());
    let synth = synthesizer(&backend).with_span_sink(Arc::new(NdjsonSpanWriter::new(blocker.join("spans.ndjson"))));

    assert!(synth.create_ticket(pothole_request()).await.is_ok());
}

async fn ndjson_sessions(dir: &std::path::Path) -> Arc<SessionStore<PipelineEvent>> {
    let registry = NdjsonLog::<SessionInfo>::open(dir.join("sessions.ndjson")).unwrap();
    let events = NdjsonLog::<Event<PipelineEvent>>::open(dir.join("events.ndjson")).unwrap();
    Arc::new(SessionStore::open(Arc::new(registry), Arc::new(events)).await.unwrap())
}

#[tokio::test]
async fn ndjson_stores_survive_reopen() {
    let dir = tempdir().unwrap();
    let memory_path = dir.path().join("memory.ndjson");

    let created = {
        let backend = Arc::new(CannedBackend::new());
        let memory_log = NdjsonLog::<MemoryEntry>::open(&memory_path).unwrap();
        let memory = Arc::new(MemoryStore::with_log(Arc::new(memory_log)));
        let synth = synthesizer(&backend)
            .with_memory(memory)
            .with_sessions(ndjson_sessions(dir.path()).await);
        synth.create_ticket(pothole_request()).await.unwrap()
    };

    let reopened = MemoryStore::with_log(Arc::new(NdjsonLog::<MemoryEntry>::open(&memory_path).unwrap()));
    let entries = reopened.query_memory("user-1", SUBMITTED_TICKET_KEY).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].data["issue_category"], "pothole");

    let sessions = ndjson_sessions(dir.path()).await;
    assert_eq!(sessions.list_sessions().await, vec![created.session_id.clone()]);
    let session = sessions.get_session(&created.session_id).await.unwrap().unwrap();
    assert_eq!(session.user_id, "user-1");
    assert_eq!(session.events.len(), 3);

    let backend = Arc::new(CannedBackend::new());
    let synth = synthesizer(&backend).with_sessions(sessions);
    let again = synth
        .create_ticket(pothole_request().in_session(&created.session_id))
        .await
        .unwrap();
    assert_eq!(again.session_id, created.session_id);
    assert_eq!(event_kinds(&synth, &created.session_id).await.len(), 6);
}

#[tokio::test]
async fn drafting_failure_propagates_and_skips_persistence() {
    let mut mock = MockBackend::new();
    mock.expect_generate_structured_vision()
        .times(1)
        .returning(|_, _, _, _| Ok(StructuredResponse::Parsed { value: json!({"summary": "ok"}) }));
    mock.expect_generate_structured()
        .with(predicate::always(), predicate::always())
        .times(1)
        .returning(|_, _| Err(ServiceError::rate_limit("Quota exceeded")));

    let synth = TicketSynthesizer::new(Arc::new(mock), EvidenceSchema::bundled().unwrap());
    let err = synth.create_ticket(pothole_request()).await.unwrap_err();

    match err {
        PipelineError::Backend(inner) => assert!(matches!(inner.root(), ServiceError::RateLimit(_))),
        other => panic!("expected backend error, got {:?}", other),
    }
    let session = &synth.sessions().list_sessions().await[0];
    assert_eq!(event_kinds(&synth, session).await, vec!["research", "evidence"]);
    assert!(synth.memory().list_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn vision_failure_stops_before_drafting() {
    let mut mock = MockBackend::new();
    mock.expect_generate_structured_vision()
        .times(1)
        .returning(|_, _, _, _| Err(ServiceError::timeout("vision timed out")));
    mock.expect_generate_structured().never();

    let synth = TicketSynthesizer::new(Arc::new(mock), EvidenceSchema::bundled().unwrap());
    assert!(matches!(
        synth.create_ticket(pothole_request()).await,
        Err(PipelineError::Backend(_))
    ));
}

#[test]
fn bundled_schema_matches_file_on_disk() {
    let bundled = EvidenceSchema::bundled().unwrap();
    let loaded = EvidenceSchema::load(EvidenceSchema::default_path()).unwrap();
    assert_eq!(bundled, loaded);

    let required = bundled.as_value()["required"].as_array().unwrap();
    assert_eq!(required.len(), 4);
    assert_eq!(bundled.as_value()["properties"]["severity"]["enum"], json!(["low", "medium", "high"]));
}

#[test]
fn malformed_schema_file_is_a_schema_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schema.json");
    std::fs::write(&path, "[\"not\", \"an object\"]").unwrap();

    assert!(matches!(EvidenceSchema::load(&path), Err(PipelineError::Schema(_))));
    assert!(matches!(
        EvidenceSchema::load(dir.path().join("missing.json")),
        Err(PipelineError::Schema(_))
    ));
}

fn complete_record() -> Value {
    json!({
        "issue_category": "pothole",
        "severity": "High",
        "location": "Main St",
        "summary": "Deep pothole",
        "department": "public works"
    })
}

#[tokio::test]
async fn complete_form_is_submitted() {
    let backend = Arc::new(CannedBackend::new());
    backend.push_text(Ok("  Your pothole report is in.  ".into()));
    let agent = FormAgent::new(backend.clone());

    let result = agent.submit_value(&complete_record()).await.unwrap();

    assert!(result.success);
    assert!(result.missing_fields.is_empty());
    assert_eq!(result.message, "Your pothole report is in.");
    let receipt = result.backend.unwrap();
    assert_eq!(receipt.form_id, result.form_payload.form_id);
    assert_eq!(result.form_payload.fields["department"], "public works");

    match &backend.calls()[0] {
        BackendCall::Text { prompt, temperature } => {
            assert!(prompt.contains("successfully prepared"));
            assert_eq!(*temperature, 0.0);
        }
        other => panic!("expected text call, got {:?}", other),
    }
}

#[tokio::test]
async fn incomplete_form_reports_missing_fields() {
    let backend = Arc::new(CannedBackend::new());
    backend.push_text(Ok("Please add a location.".into()));
    let agent = FormAgent::new(backend.clone());

    let mut record = complete_record();
    record["location"] = json!("");
    let result = agent.submit_value(&record).await.unwrap();

    assert!(!result.success);
    assert!(result.backend.is_none());
    assert_eq!(result.missing_fields, vec!["location"]);
    assert_eq!(result.message, "Please add a location.");
    assert!(matches!(&backend.calls()[0], BackendCall::Text { prompt, .. } if prompt.contains("missing fields")));
}

#[tokio::test]
async fn non_object_form_record_is_missing_everything() {
    let agent = FormAgent::new(Arc::new(CannedBackend::new()));
    let result = agent.submit_value(&json!("just a string")).await.unwrap();

    assert_eq!(result.missing_fields, vec!["issue_category", "severity", "location", "summary"]);
    assert!(!result.success);
}

#[tokio::test]
async fn form_message_failure_is_an_error() {
    let mut mock = MockBackend::new();
    mock.expect_generate_text()
        .with(predicate::always(), predicate::eq(0.0f32))
        .times(1)
        .returning(|_, _| Err(ServiceError::network("connection reset")));

    let agent = FormAgent::new(Arc::new(mock));
    let record = complete_record();
    assert!(matches!(
        agent.submit_form(record.as_object().unwrap()).await,
        Err(PipelineError::Backend(_))
    ));
}

#[tokio::test]
async fn sms_is_truncated() {
    let backend = Arc::new(CannedBackend::new());
    backend.push_text(Ok("x".repeat(400)));
    let agent = CommsAgent::new(backend);

    let sms = agent.generate_sms(&json!({"ticket_id": "TKT-1"})).await.unwrap();
    assert_eq!(sms.chars().count(), SMS_MAX_CHARS);
}

#[tokio::test]
async fn all_channels_make_one_call_each_in_order() {
    let backend = Arc::new(CannedBackend::new());
    backend
        .push_text(Ok(" sms ".into()))
        .push_text(Ok(" email body ".into()))
        .push_text(Ok(" app ".into()));
    let agent = CommsAgent::new(backend.clone());

    let ticket = json!({"ticket_id": "TKT-42", "location": "Main St"});
    let messages = agent.generate_all_channels(&ticket).await.unwrap();

    assert_eq!(messages.sms, "sms");
    assert_eq!(messages.email, "email body");
    assert_eq!(messages.app_notification, "app");

    let prompts: Vec<String> = backend
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            BackendCall::Text { prompt, .. } => Some(prompt),
            _ => None,
        })
        .collect();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("SMS"));
    assert!(prompts[1].contains("EMAIL"));
    assert!(prompts[2].contains("APP NOTIFICATION"));
    assert!(prompts.iter().all(|p| p.contains("TKT-42")));
}

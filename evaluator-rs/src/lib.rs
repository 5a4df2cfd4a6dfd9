// evaluator-rs/src/lib.rs
// Golden-case evaluation of the ticket pipeline.
//
// Each case is replayed through `TicketSynthesizer::create_ticket`, scored
// against its expected department, category and severity, checked for the
// research and evidence stages in its session log, and streamed to an NDJSON
// results file. The aggregate metric is the goal completion rate (GCR).

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use civic_agents::{PipelineError, Ticket, TicketRequest, TicketResponse, TicketSynthesizer};
use serde::{Deserialize, Serialize};
use tracing::instrument;

pub mod golden;
pub mod results;
pub mod scoring;

pub use golden::{load_golden_cases, Expected, GoldenCase};
pub use results::ResultsWriter;
pub use scoring::{score_ticket, token_estimate, Score};

pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("golden tests not found: {0}")]
    GoldenNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub case_id: String,
    pub session_id: String,
    pub ticket_id: String,
    pub elapsed_s: f64,
    pub called_research: bool,
    pub called_evidence: bool,
    pub token_estimate: usize,
    pub score: Score,
    pub ticket: Ticket,
    pub raw_orch_response: TicketResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub total_cases: usize,
    pub successful_cases: usize,
    #[serde(rename = "GCR")]
    pub gcr: f64,
    pub results_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub summary: EvaluationSummary,
    pub results: Vec<EvaluationResult>,
}

/// Successful over total, `0.0` when there are no cases
pub fn goal_completion_rate(successful: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        successful as f64 / total as f64
    }
}

pub struct Evaluator {
    synthesizer: Arc<TicketSynthesizer>,
}

impl Evaluator {
    pub fn new(synthesizer: Arc<TicketSynthesizer>) -> Self {
        Self { synthesizer }
    }

    pub fn synthesizer(&self) -> &Arc<TicketSynthesizer> {
        &self.synthesizer
    }

    /// Run one case end to end and score it
    #[instrument(skip(self, case), fields(case_id = %case.id))]
    pub async fn run_case(&self, case: &GoldenCase) -> Result<EvaluationResult> {
        let request = TicketRequest::new(case.user_id(), &case.location, &case.description)
            .with_images(case.images.clone());

        let started = Instant::now();
        let response = self.synthesizer.create_ticket(request).await?;
        let elapsed_s = started.elapsed().as_secs_f64();

        let ticket = response.ticket.clone();
        let score = score_ticket(&ticket, &case.expected);

        let events = self
            .synthesizer
            .sessions()
            .events(&response.session_id)
            .await
            .map_err(PipelineError::from)?;
        let called_research = events.iter().any(|e| e.event.kind() == "research");
        let called_evidence = events.iter().any(|e| e.event.kind() == "evidence");

        tracing::info!(
            success = score.success,
            department = %ticket.department,
            issue_category = %ticket.issue_category,
            "case evaluated"
        );

        Ok(EvaluationResult {
            case_id: case.id.clone(),
            session_id: response.session_id.clone(),
            ticket_id: ticket.ticket_id.clone(),
            elapsed_s,
            called_research,
            called_evidence,
            token_estimate: token_estimate(&case.description) + token_estimate(&ticket.summary),
            score,
            ticket,
            raw_orch_response: response,
        })
    }

    /// Run every case in order, appending each result to `out_path` as soon
    /// as it completes. The first failing case aborts the run; results
    /// written before it stay on disk.
    pub async fn run_all(&self, cases: &[GoldenCase], out_path: impl AsRef<Path>) -> Result<EvaluationReport> {
        let writer = ResultsWriter::new(out_path.as_ref());
        let mut results = Vec::with_capacity(cases.len());

        for case in cases {
            let result = self.run_case(case).await?;
            writer.append(&result).await?;
            results.push(result);
        }

        let successful_cases = results.iter().filter(|r| r.score.success).count();
        let summary = EvaluationSummary {
            total_cases: cases.len(),
            successful_cases,
            gcr: goal_completion_rate(successful_cases, cases.len()),
            results_file: writer.path().display().to_string(),
        };
        tracing::info!(
            total = summary.total_cases,
            successful = summary.successful_cases,
            gcr = summary.gcr,
            "evaluation finished"
        );

        Ok(EvaluationReport { summary, results })
    }
}

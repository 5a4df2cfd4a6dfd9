// civic-agents-rs/src/lib.rs
// Agents that turn a citizen complaint into a municipal ticket.
//
// Pipeline: `HeuristicIssueClassifier` (research) -> `EvidenceAnalyzer`
// (vision) -> `TicketSynthesizer` (merge + persistence). `FormAgent` and
// `CommsAgent` consume finished tickets.
//
// Every agent takes its generative backend as an injected
// `Arc<dyn GenerativeBackend>`; there is no process-wide client.

use uuid::Uuid;

pub mod classifier;
pub mod comms;
pub mod evidence;
pub mod form;
pub mod model;
pub mod routing;
pub mod synthesizer;
pub mod trace;

#[cfg(test)]
mod tests;

pub use classifier::{HeuristicIssueClassifier, IssueClassifier};
pub use comms::{ChannelMessages, CommsAgent};
pub use evidence::{EvidenceAnalyzer, EvidenceSchema};
pub use form::{FieldIssue, FieldProblem, FormAgent, FormSubmission};
pub use model::*;
pub use synthesizer::{TicketSynthesizer, SUBMITTED_TICKET_KEY};
pub use trace::{NdjsonSpanWriter, NoopSpanSink, SpanSink, TraceSpan};

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Top-level error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("backend error: {0}")]
    Backend(#[from] llm_sdk::ServiceError),

    #[error("store error: {0}")]
    Store(#[from] session_store::StoreError),

    #[error("failed to read image {path}: {source}")]
    ImageRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// `prefix` followed by the first `len` hex digits of a fresh UUID v4
pub(crate) fn short_id(prefix: &str, len: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, &hex[..len.min(hex.len())])
}

// evaluator-rs/src/main.rs
// civic-eval: replays the golden cases and prints the evaluation summary.
//
// Environment:
// - GEMINI_API_KEY (required unless EVAL_OFFLINE is set), GEMINI_MODEL, ...
// - GOLDEN_TESTS_PATH (default: data/golden_tests.json in this crate)
// - EVAL_RESULTS_PATH (default: evaluation_results.ndjson)
// - EVAL_APPEND_RESULTS: keep earlier results instead of truncating
// - EVAL_OFFLINE: use the deterministic canned backend
// - OBSERVABILITY_SPANS_PATH (default: observability_spans.ndjson)

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use civic_agents::{EvidenceSchema, NdjsonSpanWriter, TicketSynthesizer};
use config_rs::{env_flag, env_path, init_tracing, load_env};
use evaluator::{load_golden_cases, Evaluator, ResultsWriter};
use llm_sdk::{CannedBackend, GeminiClient, GenerativeBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = load_env();
    init_tracing("civic-eval", "info");
    match env_file {
        Some(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        None => tracing::debug!("no .env file found, using process environment"),
    }

    let backend: Arc<dyn GenerativeBackend> = if env_flag("EVAL_OFFLINE", false) {
        tracing::warn!("EVAL_OFFLINE set; using the canned backend");
        Arc::new(CannedBackend::new())
    } else {
        Arc::new(GeminiClient::from_env().context("failed to configure Gemini client")?)
    };

    let schema = EvidenceSchema::from_env().context("failed to load evidence schema")?;
    let spans = NdjsonSpanWriter::new(env_path("OBSERVABILITY_SPANS_PATH", "observability_spans.ndjson"));
    let synthesizer = TicketSynthesizer::new(backend, schema).with_span_sink(Arc::new(spans));

    let golden_path = env_path(
        "GOLDEN_TESTS_PATH",
        Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join("golden_tests.json"),
    );
    let results_path = env_path("EVAL_RESULTS_PATH", "evaluation_results.ndjson");

    let cases = load_golden_cases(&golden_path).await?;

    if !env_flag("EVAL_APPEND_RESULTS", false) {
        ResultsWriter::new(&results_path).truncate().await?;
    }

    let report = Evaluator::new(Arc::new(synthesizer))
        .run_all(&cases, &results_path)
        .await?;

    println!("=== EVALUATION SUMMARY ===");
    println!("{}", serde_json::to_string_pretty(&report.summary)?);

    Ok(())
}

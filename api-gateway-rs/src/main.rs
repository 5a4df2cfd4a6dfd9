// api-gateway-rs/src/main.rs
// API Gateway - HTTP entry point for the civic ticket pipeline
// Port 8000 by default (GATEWAY_SERVICE_PORT / GATEWAY_SERVICE_ADDR)

use std::sync::Arc;

use anyhow::Context;
use api_gateway::{create_router, AppState};
use civic_agents::{EvidenceSchema, NdjsonSpanWriter, TicketSynthesizer};
use config_rs::{env_path, get_bind_address, init_tracing, load_env};
use llm_sdk::GeminiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = load_env();
    init_tracing(api_gateway::SERVICE_NAME, "info,tower_http=debug");
    match env_file {
        Some(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        None => tracing::debug!("no .env file found, using process environment"),
    }

    let backend = GeminiClient::from_env().context("failed to configure Gemini client")?;
    tracing::info!(model = %backend.config().model, "Gemini backend configured");

    let schema = EvidenceSchema::from_env().context("failed to load evidence schema")?;
    let spans_path = env_path("OBSERVABILITY_SPANS_PATH", "observability_spans.ndjson");
    tracing::info!(path = %spans_path.display(), "writing trace spans");

    let synthesizer = TicketSynthesizer::new(Arc::new(backend), schema)
        .with_span_sink(Arc::new(NdjsonSpanWriter::new(spans_path)));
    let app = create_router(AppState::new(Arc::new(synthesizer)));

    let addr = get_bind_address("GATEWAY", 8000);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API Gateway listening");

    axum::serve(listener, app).await?;

    Ok(())
}

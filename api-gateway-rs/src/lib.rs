//! HTTP surface for the civic ticket pipeline.
//!
//! Routes:
//! - `POST /create_ticket`: run the ticket pipeline for one complaint
//! - `GET /sessions/:id`: a session and its events
//! - `POST /submit_form`: validate and submit a municipal form record
//! - `POST /notify`: citizen confirmation messages for a ticket
//! - `GET /health`

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use civic_agents::{
    ChannelMessages, CommsAgent, FormAgent, FormSubmission, PipelineError, PipelineEvent, TicketRequest,
    TicketResponse, TicketSynthesizer,
};
use serde::Serialize;
use serde_json::Value;
use session_store::{Session, StoreError};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod validation;

#[cfg(test)]
mod tests;

pub const SERVICE_NAME: &str = "api-gateway";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: i64,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

/// Handler-level failures, rendered as [`ErrorResponse`] JSON
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Session {0} not found")]
    SessionNotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Pipeline(PipelineError::Store(StoreError::SessionNotFound(_))) => StatusCode::NOT_FOUND,
            ApiError::Pipeline(PipelineError::Backend(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Pipeline(PipelineError::ImageRead { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Pipeline(PipelineError::Store(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::info!(error = %self, "request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                code: status.as_u16(),
            }),
        )
            .into_response()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    synthesizer: Arc<TicketSynthesizer>,
    forms: Arc<FormAgent>,
    comms: Arc<CommsAgent>,
    started: Instant,
}

impl AppState {
    /// Form and comms agents share the synthesizer's backend
    pub fn new(synthesizer: Arc<TicketSynthesizer>) -> Self {
        let backend = Arc::clone(synthesizer.backend());
        Self {
            forms: Arc::new(FormAgent::new(Arc::clone(&backend))),
            comms: Arc::new(CommsAgent::new(backend)),
            synthesizer,
            started: Instant::now(),
        }
    }

    pub fn synthesizer(&self) -> &Arc<TicketSynthesizer> {
        &self.synthesizer
    }
}

/// Create the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let json_routes = Router::new()
        .route("/create_ticket", post(create_ticket_handler))
        .route("/submit_form", post(submit_form_handler))
        .route("/notify", post(notify_handler))
        .route_layer(middleware::from_fn(validation::validate_request_middleware));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/sessions/:id", get(session_handler))
        .merge(json_routes)
        .layer(validation::payload_limit_config())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "Civic Ticket API Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /health",
            "GET /sessions/:id",
            "POST /create_ticket",
            "POST /submit_form",
            "POST /notify"
        ]
    }))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        service_name: SERVICE_NAME.to_string(),
        uptime_seconds: state.started.elapsed().as_secs() as i64,
        status: "SERVING".to_string(),
    })
}

async fn create_ticket_handler(
    State(state): State<AppState>,
    Json(request): Json<TicketRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    tracing::info!(user_id = %request.user_id, images = request.image_paths.len(), "create_ticket request");
    let response = state.synthesizer.create_ticket(request).await?;
    Ok(Json(response))
}

async fn session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session<PipelineEvent>>, ApiError> {
    state
        .synthesizer
        .sessions()
        .get_session(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::SessionNotFound(id))
}

async fn submit_form_handler(
    State(state): State<AppState>,
    Json(record): Json<Value>,
) -> Result<Json<FormSubmission>, ApiError> {
    Ok(Json(state.forms.submit_value(&record).await?))
}

async fn notify_handler(
    State(state): State<AppState>,
    Json(ticket): Json<Value>,
) -> Result<Json<ChannelMessages>, ApiError> {
    Ok(Json(state.comms.generate_all_channels(&ticket).await?))
}

//! Axum route handlers for the persona-chat HTTP server.
//!
//! # Routes
//!
//! - `GET    /`                           - Service info and endpoint list
//! - `GET    /health`                     - `{"status": "healthy", "timestamp": ...}`
//! - `POST   /initialize`                 - Research and prepare a personality
//! - `POST   /chat`                       - Send a message, get the persona's reply
//! - `GET    /conversation/:person_name`  - Conversation info
//! - `DELETE /conversation/:person_name`  - Clear the conversation
//! - `POST   /reinitialize/:person_name`  - Drop the cached personality and research again
//! - `GET    /cache`                      - Personality cache snapshot

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::CacheInfo;
use crate::chat::{ChatOrchestrator, DataQuality, InitializationResult};

type ApiError = (StatusCode, Json<Value>);

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<ChatOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub person_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub success: bool,
    pub personality_context: String,
    pub errors: Vec<String>,
    pub data_quality: DataQuality,
}

impl From<InitializationResult> for InitializeResponse {
    fn from(result: InitializationResult) -> Self {
        Self {
            success: result.diagnostics.is_empty(),
            personality_context: result.personality_context,
            errors: result.diagnostics,
            data_quality: result.data_quality,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub person_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub person_name: String,
    /// Completed exchanges, including this one.
    pub message_count: usize,
    pub estimated_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationInfoResponse {
    pub message_count: usize,
    pub estimated_tokens: usize,
    pub person_name: String,
    pub personality_context: String,
    pub session_id: Option<String>,
    pub initialized: bool,
}

// ============================================================================
// Router
// ============================================================================

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/initialize", post(initialize_handler))
        .route("/chat", post(chat_handler))
        .route(
            "/conversation/:person_name",
            get(conversation_info_handler).delete(clear_conversation_handler),
        )
        .route("/reinitialize/:person_name", post(reinitialize_handler))
        .route("/cache", get(cache_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
}

fn require_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        Err(bad_request("person_name must not be empty"))
    } else {
        Ok(name)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - service description.
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Persona Chat API",
        "version": crate::VERSION,
        "endpoints": {
            "POST /initialize": "Initialize AI personality",
            "POST /chat": "Send a message and get response",
            "GET /conversation/{person_name}": "Get conversation info",
            "DELETE /conversation/{person_name}": "Clear conversation",
            "POST /reinitialize/{person_name}": "Reinitialize personality",
            "GET /cache": "Personality cache state",
        },
    }))
}

/// GET /health - liveness check.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// POST /initialize - research (or reuse) a personality.
///
/// Research never fails; a degraded personality is reported through
/// `success: false` and `errors`.
async fn initialize_handler(
    State(state): State<AppState>,
    Json(request): Json<InitializeRequest>,
) -> Result<Json<InitializeResponse>, ApiError> {
    let name = require_name(&request.person_name)?;
    tracing::info!(person_name = name, "initialize");

    let result = state.orchestrator.initialize(name).await;
    Ok(Json(result.into()))
}

/// POST /chat - one conversational turn.
async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let name = require_name(&request.person_name)?;
    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let turn = state
        .orchestrator
        .chat_turn(name, &request.message)
        .await
        .map_err(|e| {
            tracing::error!(person_name = name, error = %e, "chat failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        })?;

    Ok(Json(ChatResponse {
        response: turn.response,
        person_name: name.to_string(),
        message_count: turn.exchange_count,
        estimated_tokens: turn.estimated_tokens,
    }))
}

/// GET /conversation/:person_name - conversation info.
async fn conversation_info_handler(
    State(state): State<AppState>,
    Path(person_name): Path<String>,
) -> Result<Json<ConversationInfoResponse>, ApiError> {
    let name = require_name(&person_name)?;
    let info = state.orchestrator.get_info(name).await;

    Ok(Json(ConversationInfoResponse {
        message_count: info.exchange_count,
        estimated_tokens: info.estimated_tokens,
        person_name: info.subject,
        personality_context: info.current_prompt,
        session_id: info.session_id,
        initialized: info.initialized,
    }))
}

/// DELETE /conversation/:person_name - clear history, keep personality.
async fn clear_conversation_handler(
    State(state): State<AppState>,
    Path(person_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let name = require_name(&person_name)?;
    state.orchestrator.clear(name).await;

    Ok(Json(serde_json::json!({
        "message": format!("Conversation cleared for {}", name),
    })))
}

/// POST /reinitialize/:person_name - force fresh research.
async fn reinitialize_handler(
    State(state): State<AppState>,
    Path(person_name): Path<String>,
) -> Result<Json<InitializeResponse>, ApiError> {
    let name = require_name(&person_name)?;
    tracing::info!(person_name = name, "reinitialize");

    let result = state.orchestrator.reinitialize(name).await;
    Ok(Json(result.into()))
}

/// GET /cache - personality cache snapshot.
async fn cache_handler(State(state): State<AppState>) -> Json<CacheInfo> {
    Json(state.orchestrator.researcher().cache_info())
}

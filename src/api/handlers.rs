//! HTTP request handlers

use super::types::{
    ConversationResponse, ErrorResponse, GenerateRequest, HealthResponse, MessageRequest,
};
use super::AppState;
use crate::llm::GeneratedContent;
use crate::runtime::{ConversationView, GenerateInput, TurnError, TurnResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/conversations/:id/messages", post(send_message))
        .route("/api/conversations/:id/reset", post(reset_conversation))
        .route("/api/conversations/:id/generate", post(generate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        search_available: state.coordinator.search_available(),
        model: state.coordinator.model_id().to_string(),
    })
}

// ============================================================
// Conversation Turns
// ============================================================

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<TurnResult>, AppError> {
    let turn = state.coordinator.process_turn(&id, &req.message).await?;
    Ok(Json(turn))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationView>, AppError> {
    Ok(Json(state.coordinator.get_session(&id).await?))
}

async fn reset_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state.coordinator.reset_session(&id).await?;
    Ok(Json(ConversationResponse { conversation }))
}

// ============================================================
// Content Generation
// ============================================================

async fn generate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GeneratedContent>, AppError> {
    let input = GenerateInput {
        prompt: req.prompt,
        content_type: req.content_type,
    };
    Ok(Json(state.coordinator.generate(&id, input).await?))
}

// ============================================================
// Error Handling
// ============================================================

struct AppError(TurnError);

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TurnError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TurnError::NotFound(_) => StatusCode::NOT_FOUND,
            TurnError::NotReady(_) => StatusCode::CONFLICT,
            TurnError::Generation(_) => StatusCode::BAD_GATEWAY,
            TurnError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            TurnError::Storage(_) | TurnError::Invariant(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.0.to_string()));
        (status, body).into_response()
    }
}

//! HTTP API over the Q&A pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question: `{ "question": "...", "userId": "..." }` |
//! | `GET` | `/history/{user_id}?limit=N` | Recent turns, oldest first |
//! | `GET` | `/summary/{user_id}` | The user's running summary |
//! | `DELETE` | `/history/{user_id}` | Forget a user's turns and summary |
//! | `GET` | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! `POST /ask` answers 200 for every question that passes validation, even
//! when the pipeline reports `success: false`; the body carries the reason
//! and the trace.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use cricket_qa_core::models::{ConversationTurn, UserSummary};

use crate::config::Config;
use crate::pipeline::{AskResponse, QaService};

/// Longest accepted question, in characters after trimming.
pub const MAX_QUESTION_CHARS: usize = 500;

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 200;

#[derive(Clone)]
struct AppState {
    service: Arc<QaService>,
}

/// Start the server on `[server].bind` and run until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = QaService::open(config).await?;
    let app = router(Arc::new(service));

    tracing::info!(bind = %config.server.bind, "cricket Q&A server listening");

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Exposed so tests can drive it without a socket.
pub fn router(service: Arc<QaService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route(
            "/history/{user_id}",
            get(handle_history).delete(handle_clear),
        )
        .route("/summary/{user_id}", get(handle_summary))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { service })
}

/// Trim and bound-check a question and user id before the pipeline runs.
pub fn validate_question(question: &str, user_id: &str) -> Result<(), String> {
    let question = question.trim();
    if question.is_empty() {
        return Err("question must not be empty".to_string());
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(format!(
            "question must be at most {} characters",
            MAX_QUESTION_CHARS
        ));
    }
    if user_id.trim().is_empty() {
        return Err("userId must not be empty".to_string());
    }
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    user_id: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    req: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) =
        req.map_err(|e| bad_request(format!("invalid request body: {}", e.body_text())))?;
    validate_question(&req.question, &req.user_id).map_err(|m| bad_request(m))?;
    let response = state
        .service
        .ask(req.question.trim(), req.user_id.trim())
        .await;
    Ok(Json(response))
}

// ============ /history/{user_id} ============

#[derive(Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    user_id: String,
    turns: Vec<ConversationTurn>,
}

async fn handle_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let turns = state
        .service
        .memory()
        .history(&user_id, limit)
        .await
        .map_err(internal)?;
    Ok(Json(HistoryResponse { user_id, turns }))
}

#[derive(Serialize)]
struct ClearResponse {
    cleared: bool,
}

async fn handle_clear(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ClearResponse>, AppError> {
    state
        .service
        .memory()
        .clear(&user_id)
        .await
        .map_err(internal)?;
    Ok(Json(ClearResponse { cleared: true }))
}

// ============ GET /summary/{user_id} ============

async fn handle_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserSummary>, AppError> {
    state
        .service
        .memory()
        .summary(&user_id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found(format!("no summary for user: {}", user_id)))
}

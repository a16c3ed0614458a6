//! Shared API state, error type and liveness handlers

use crate::ws::SyncContext;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

/// Shared server state
pub struct ServerState {
    pub sync: Arc<SyncContext>,
    /// Origins allowed by CORS; empty allows any origin
    pub allowed_origins: Vec<String>,
}

/// Shared state handed to every handler
pub type NotesState = Arc<ServerState>;

// ============================================================================
// Liveness
// ============================================================================

/// `GET /hi`
pub async fn hi() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "hi": true }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub neo4j: String,
    pub sessions: usize,
}

/// Health check endpoint
///
/// Returns:
/// - 200 + `"ok"` if Neo4j is connected
/// - 503 + `"unhealthy"` otherwise
pub async fn health(State(state): State<NotesState>) -> (StatusCode, Json<HealthResponse>) {
    let neo4j_ok = state.sync.store.health_check().await.unwrap_or(false);
    let sessions = state.sync.registry.len().await;

    let http_status = if neo4j_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status: if neo4j_ok { "ok" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            neo4j: if neo4j_ok {
                "connected".to_string()
            } else {
                "disconnected".to_string()
            },
            sessions,
        }),
    )
}

// ============================================================================
// Errors
// ============================================================================

/// API error type
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

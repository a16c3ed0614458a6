//! Sync actions over plain HTTP
//!
//! Runs a frame on behalf of the caller's open WebSocket session. Broadcasts
//! skip every session of the caller's invitation, as they do over the socket.

use super::handlers::{AppError, NotesState};
use crate::auth::InvitationPrincipal;
use crate::ws::{OutgoingEvent, SyncError, WsSession};
use axum::{extract::State, Json};

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Store(e) => AppError::Internal(e),
            SyncError::NotFound(id) => AppError::NotFound(format!("Note {} not found", id)),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

/// `POST /http`: body is a frame of `[action, payload]` pairs
pub async fn http_sync(
    State(state): State<NotesState>,
    principal: InvitationPrincipal,
    body: String,
) -> Result<Json<Vec<OutgoingEvent>>, AppError> {
    let me = principal.me()?.clone();
    let session = state
        .sync
        .registry
        .session_by_device(&principal.device_token)
        .await
        .ok_or_else(|| {
            AppError::BadRequest("Websocket connection must also be open".to_string())
        })?;

    let mut ws = WsSession::identified(
        session.id,
        me,
        principal.device_token.clone(),
        state.sync.clone(),
    );
    Ok(Json(ws.receive(&body).await?))
}

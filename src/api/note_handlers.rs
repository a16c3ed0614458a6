//! Note access handlers

use super::handlers::{AppError, NotesState};
use crate::auth::InvitationPrincipal;
use crate::neo4j::models::Invitation;
use axum::{
    extract::{Path, State},
    Json,
};

/// `GET /note/{id}/invitations`: invitations with edit access to a note
pub async fn note_invitations(
    State(state): State<NotesState>,
    principal: InvitationPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Vec<Invitation>>, AppError> {
    let me = principal.me()?;
    let not_found = || AppError::NotFound(format!("Note {} not found", id));

    let note = state.sync.store.get_note(&id).await?.ok_or_else(not_found)?;
    if !state.sync.access.can_edit(&me.id, &note).await? {
        return Err(not_found());
    }

    Ok(Json(state.sync.access.invitations_for_note(&id, false).await?))
}

//! Self-service handlers for the caller's own invitation

use super::handlers::{AppError, NotesState};
use crate::auth::InvitationPrincipal;
use crate::neo4j::models::Invitation;
use axum::{extract::State, Json};
use serde::Deserialize;

/// Maximum length of an invitation name
pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectInvitationRequest {
    pub token: String,
}

/// `GET /me`
pub async fn get_me(principal: InvitationPrincipal) -> Result<Json<Invitation>, AppError> {
    Ok(Json(principal.me()?.clone()))
}

/// `POST /me`: rename the caller's invitation
pub async fn update_me(
    State(state): State<NotesState>,
    principal: InvitationPrincipal,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<Invitation>, AppError> {
    let mut invitation = principal.me()?.clone();
    let name = req
        .name
        .ok_or_else(|| AppError::BadRequest("name is required".to_string()))?;

    invitation.name = Some(name.chars().take(MAX_NAME_LEN).collect());
    let updated = state.sync.store.update_invitation(&invitation).await?;

    state
        .sync
        .registry
        .invitations_changed(principal.invitation_id())
        .await;

    Ok(Json(updated))
}

/// `POST /me/invitation`: connect this device to the invitation holding `token`
pub async fn connect_invitation(
    State(state): State<NotesState>,
    principal: InvitationPrincipal,
    Json(req): Json<ConnectInvitationRequest>,
) -> Result<Json<Invitation>, AppError> {
    if principal.invitation.is_some() {
        return Err(AppError::BadRequest(
            "Already connected to an invitation".to_string(),
        ));
    }

    state
        .sync
        .devices
        .connect(&principal.device_token, &req.token)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Unknown invitation token".to_string()))
}

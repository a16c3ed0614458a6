//! Invitation management handlers

use super::handlers::{AppError, NotesState};
use crate::auth::names::gen_human_name;
use crate::auth::token::generate_invitation_token;
use crate::auth::InvitationPrincipal;
use crate::neo4j::models::Invitation;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::me_handlers::MAX_NAME_LEN;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvitationRequest {
    pub name: Option<String>,
    pub is_steward: Option<bool>,
}

fn visible_to(principal: &InvitationPrincipal, invitation: Invitation) -> Invitation {
    if principal.is_steward() {
        invitation
    } else {
        invitation.redacted()
    }
}

/// `GET /invitations`
pub async fn list_invitations(
    State(state): State<NotesState>,
    principal: InvitationPrincipal,
) -> Result<Json<Vec<Invitation>>, AppError> {
    principal.me()?;
    let invitations = state.sync.store.list_invitations().await?;
    Ok(Json(
        invitations
            .into_iter()
            .map(|i| visible_to(&principal, i))
            .collect(),
    ))
}

/// `POST /invitations`: create a non-steward invitation
pub async fn create_invitation(
    State(state): State<NotesState>,
    principal: InvitationPrincipal,
) -> Result<(StatusCode, Json<Invitation>), AppError> {
    principal.steward()?;

    let invitation = state
        .sync
        .store
        .insert_invitation(&Invitation {
            token: Some(generate_invitation_token()),
            name: Some(gen_human_name()),
            is_steward: false,
            ..Default::default()
        })
        .await?;
    tracing::info!(invitation = %invitation.id, "Created invitation");

    state
        .sync
        .registry
        .invitations_changed(principal.invitation_id())
        .await;

    Ok((StatusCode::CREATED, Json(invitation)))
}

/// `GET /invitations/{id}`
pub async fn get_invitation(
    State(state): State<NotesState>,
    principal: InvitationPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Invitation>, AppError> {
    principal.me()?;
    let invitation = state
        .sync
        .store
        .get_invitation(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invitation {} not found", id)))?;
    Ok(Json(visible_to(&principal, invitation)))
}

/// `POST /invitations/{id}`: rename, grant stewardship, or give up one's own
pub async fn update_invitation(
    State(state): State<NotesState>,
    principal: InvitationPrincipal,
    Path(id): Path<String>,
    Json(req): Json<UpdateInvitationRequest>,
) -> Result<Json<Invitation>, AppError> {
    let me = principal.steward()?;
    let mut invitation = state
        .sync
        .store
        .get_invitation(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invitation {} not found", id)))?;

    if let Some(name) = req.name {
        invitation.name = Some(name.chars().take(MAX_NAME_LEN).collect());
    }

    if let Some(is_steward) = req.is_steward {
        if !is_steward && invitation.is_steward {
            if invitation.id != me.id {
                return Err(AppError::BadRequest(
                    "Only your own stewardship can be revoked".to_string(),
                ));
            }
            let stewards = state
                .sync
                .store
                .list_invitations()
                .await?
                .iter()
                .filter(|i| i.is_steward)
                .count();
            if stewards <= 1 {
                return Err(AppError::BadRequest(
                    "At least one steward must remain".to_string(),
                ));
            }
        }
        invitation.is_steward = is_steward;
    }

    let updated = state.sync.store.update_invitation(&invitation).await?;

    state
        .sync
        .registry
        .invitations_changed(principal.invitation_id())
        .await;

    Ok(Json(updated))
}

/// `POST /invitations/{id}/delete`
pub async fn delete_invitation(
    State(state): State<NotesState>,
    principal: InvitationPrincipal,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.steward()?;
    let store = &state.sync.store;

    let invitation = store
        .get_invitation(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invitation {} not found", id)))?;
    if invitation.is_steward {
        return Err(AppError::BadRequest(
            "Steward invitations cannot be deleted".to_string(),
        ));
    }

    store.delete_invitation(&id).await?;
    store.remove_devices_by_invitation(&id).await?;
    let notes = store.remove_invitation_from_all_notes(&id).await?;
    tracing::info!(invitation = %id, notes = notes.len(), "Deleted invitation");

    for note in notes {
        state.sync.registry.note_changed(
            None,
            json!({ "id": note.id, "rev": note.rev, "invitations": note.invitations }),
        );
    }

    state
        .sync
        .registry
        .invitations_changed(principal.invitation_id())
        .await;

    Ok(Json(json!({ "deleted": id })))
}

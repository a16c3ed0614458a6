//! InvitationPrincipal extractor for Axum handlers.
//!
//! Reads the principal from request extensions (populated by the
//! `require_device` middleware).

use crate::api::handlers::{AppError, NotesState};
use crate::neo4j::models::Invitation;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Device making the request and the invitation it is bound to
#[derive(Debug, Clone)]
pub struct InvitationPrincipal {
    pub device_token: String,
    pub invitation: Option<Invitation>,
}

impl InvitationPrincipal {
    /// The bound invitation, or 404 when the device has none
    pub fn me(&self) -> Result<&Invitation, AppError> {
        self.invitation
            .as_ref()
            .ok_or_else(|| AppError::NotFound("Device is not connected to an invitation".to_string()))
    }

    /// Id of the bound invitation, if any
    pub fn invitation_id(&self) -> Option<&str> {
        self.invitation.as_ref().map(|i| i.id.as_str())
    }

    pub fn is_steward(&self) -> bool {
        self.invitation.as_ref().is_some_and(|i| i.is_steward)
    }

    /// The bound invitation if it is a steward; 404 otherwise
    pub fn steward(&self) -> Result<&Invitation, AppError> {
        match &self.invitation {
            Some(invitation) if invitation.is_steward => Ok(invitation),
            _ => Err(AppError::NotFound("Not found".to_string())),
        }
    }
}

impl FromRequestParts<NotesState> for InvitationPrincipal {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &NotesState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async {
            parts
                .extensions
                .get::<InvitationPrincipal>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Device token required".to_string()))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

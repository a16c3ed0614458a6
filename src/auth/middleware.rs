//! Auth middleware for Axum routes.
//!
//! Resolves the `Authorization: Bearer <deviceToken>` header to an
//! [`InvitationPrincipal`] and injects it into request extensions.

use super::extractor::InvitationPrincipal;
use super::token::bearer_token;
use crate::api::handlers::{AppError, NotesState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Middleware that requires a device token.
///
/// # Behavior
/// 1. Extract `Authorization: Bearer <token>` header → 401 if missing
/// 2. Resolve the device (and run the first-steward bootstrap) → 500 on store failure
/// 3. Inject `InvitationPrincipal` into request extensions; the invitation may be `None`
pub async fn require_device(
    State(state): State<NotesState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let device_token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing device token".to_string()))?
        .to_string();

    let invitation = state.sync.devices.resolve(&device_token).await?;

    req.extensions_mut().insert(InvitationPrincipal {
        device_token,
        invitation,
    });

    Ok(next.run(req).await)
}

//! API route definitions

use super::handlers::{self, NotesState};
use super::{invitation_handlers, me_handlers, note_handlers, sync_handlers, ws_handlers};
use crate::auth::middleware::require_device;
use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Create the API router
pub fn create_router(state: NotesState) -> Router {
    // Routes that need a device token
    let authenticated = Router::new()
        .route(
            "/me",
            get(me_handlers::get_me).post(me_handlers::update_me),
        )
        .route("/me/invitation", post(me_handlers::connect_invitation))
        // ====================================================================
        // Invitations
        // ====================================================================
        .route(
            "/invitations",
            get(invitation_handlers::list_invitations)
                .post(invitation_handlers::create_invitation),
        )
        .route(
            "/invitations/{id}",
            get(invitation_handlers::get_invitation).post(invitation_handlers::update_invitation),
        )
        .route(
            "/invitations/{id}/delete",
            post(invitation_handlers::delete_invitation),
        )
        // ====================================================================
        // Notes
        // ====================================================================
        .route(
            "/note/{id}/invitations",
            get(note_handlers::note_invitations),
        )
        .route("/http", post(sync_handlers::http_sync))
        .layer(from_fn_with_state(state.clone(), require_device));

    Router::new()
        .route("/hi", get(handlers::hi))
        .route("/health", get(handlers::health))
        // Identification happens in-band over the socket
        .route("/ws", get(ws_handlers::ws_upgrade))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.allowed_origins))
        .with_state(state)
}

//! Test helper factories and mock state builders
//!
//! Provides convenience functions for creating test objects with sensible defaults,
//! and helpers for building mock server state and routers.
#![allow(dead_code)]

use crate::api::handlers::{NotesState, ServerState};
use crate::neo4j::mock::MockGraphStore;
use crate::neo4j::models::*;
use crate::neo4j::GraphStore;
use crate::ws::{SyncConfig, SyncContext};
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use std::sync::Arc;

// ============================================================================
// Mock state builders
// ============================================================================

/// Empty in-memory store
pub fn mock_store() -> Arc<MockGraphStore> {
    Arc::new(MockGraphStore::new())
}

/// Sync services over a mock store with default settings
pub fn sync_context(store: Arc<MockGraphStore>) -> Arc<SyncContext> {
    SyncContext::new(store, SyncConfig::default())
}

/// Server state over a mock store, any CORS origin
pub fn mock_server_state(store: Arc<MockGraphStore>) -> NotesState {
    Arc::new(ServerState {
        sync: sync_context(store),
        allowed_origins: Vec::new(),
    })
}

/// Store with a steward `admin` (device `dev-admin`) and a guest `guest`
/// (device `dev-guest`)
pub async fn seeded_store() -> Arc<MockGraphStore> {
    let store = mock_store();
    store
        .insert_invitation(&test_invitation("admin", true))
        .await
        .unwrap();
    store
        .insert_invitation(&test_invitation("guest", false))
        .await
        .unwrap();
    bind_device(store.as_ref(), "dev-admin", "admin").await;
    bind_device(store.as_ref(), "dev-guest", "guest").await;
    store
}

/// Router over [`seeded_store`]
pub async fn seeded_app() -> (Router, Arc<MockGraphStore>) {
    let store = seeded_store().await;
    let app = crate::api::create_router(mock_server_state(store.clone()));
    (app, store)
}

// ============================================================================
// Model factories
// ============================================================================

/// Note owned by `steward`
pub fn test_note(id: &str, steward: &str) -> Note {
    let mut note = Note::new(id);
    note.steward = Some(steward.to_string());
    note
}

/// Invitation with token `token-<id>`
pub fn test_invitation(id: &str, is_steward: bool) -> Invitation {
    Invitation {
        id: id.to_string(),
        token: Some(format!("token-{}", id)),
        name: Some(format!("Name {}", id)),
        is_steward,
        ..Default::default()
    }
}

/// Insert a note together with its item edges
pub async fn seed_note(store: &dyn GraphStore, note: Note) -> Note {
    let stored = store.insert_note(&note).await.unwrap();
    store
        .ensure_note_items(&stored.id, &stored.items, &stored.refs)
        .await
        .unwrap();
    stored
}

/// Upsert a device and bind it to an invitation
pub async fn bind_device(store: &dyn GraphStore, token: &str, invitation: &str) -> Device {
    let mut device = store.device_from_token(token).await.unwrap();
    device.invitation = Some(invitation.to_string());
    store.update_device(&device).await.unwrap()
}

// ============================================================================
// HTTP helpers
// ============================================================================

/// GET with a device bearer token
pub fn auth_get(uri: &str, device: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", device))
        .body(Body::empty())
        .unwrap()
}

/// POST a JSON body with a device bearer token
pub fn auth_post(uri: &str, device: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", device))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON
pub async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

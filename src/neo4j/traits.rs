//! GraphStore trait definition
//!
//! Defines the abstract interface for all graph database operations.
//! This trait mirrors the public async methods of `Neo4jClient`,
//! enabling testing with the in-memory mock and future backend swaps.

use crate::neo4j::models::*;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Abstract interface for all graph database operations.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ========================================================================
    // Note documents
    // ========================================================================

    /// Get a note by ID
    async fn get_note(&self, id: &str) -> Result<Option<Note>>;

    /// Insert a note; assigns revision and timestamps
    async fn insert_note(&self, note: &Note) -> Result<Note>;

    /// Replace an existing note; bumps the revision and `updated`.
    ///
    /// Fails with `StoreError::NotFound` if the note does not exist.
    async fn update_note(&self, note: &Note) -> Result<Note>;

    /// Delete a note and its outgoing item edges
    async fn delete_note(&self, id: &str) -> Result<()>;

    // ========================================================================
    // Item edges
    // ========================================================================

    /// Remove outgoing edges of a note whose target left `items` / `refs`
    async fn remove_obsolete_note_items(
        &self,
        note_id: &str,
        items: &[String],
        refs: &[String],
    ) -> Result<()>;

    /// Upsert one outgoing edge per entry of `items` / `refs`
    async fn ensure_note_items(&self, note_id: &str, items: &[String], refs: &[String])
        -> Result<()>;

    /// List the outgoing edges of a note
    async fn list_note_items(&self, note_id: &str) -> Result<Vec<ItemEdge>>;

    // ========================================================================
    // Access traversals
    // ========================================================================

    /// Steward and invitations of a note and of every ancestor reachable
    /// through inbound item edges, up to `MAX_TRAVERSAL_DEPTH` hops.
    ///
    /// With `include_refs`, a ref edge may be followed as the first hop; the
    /// walk then continues through that parent's item ancestors.
    async fn invitation_ids_for_note(
        &self,
        note_id: &str,
        include_refs: bool,
    ) -> Result<HashSet<String>>;

    /// Every note reachable from a note the invitation owns or is listed on
    async fn all_note_revs_by_invitation(&self, invitation_id: &str) -> Result<Vec<NoteRev>>;

    // ========================================================================
    // Invitations
    // ========================================================================

    /// Number of invitations
    async fn count_invitations(&self) -> Result<usize>;

    /// List all invitations
    async fn list_invitations(&self) -> Result<Vec<Invitation>>;

    /// Get an invitation by ID
    async fn get_invitation(&self, id: &str) -> Result<Option<Invitation>>;

    /// Get an invitation by its secret token
    async fn invitation_from_token(&self, token: &str) -> Result<Option<Invitation>>;

    /// Insert an invitation; assigns id (when empty) and timestamps
    async fn insert_invitation(&self, invitation: &Invitation) -> Result<Invitation>;

    /// Update an existing invitation
    async fn update_invitation(&self, invitation: &Invitation) -> Result<Invitation>;

    /// Delete an invitation
    async fn delete_invitation(&self, id: &str) -> Result<()>;

    /// Remove an invitation from every note that lists it; returns the updated notes
    async fn remove_invitation_from_all_notes(&self, invitation_id: &str) -> Result<Vec<Note>>;

    // ========================================================================
    // Devices
    // ========================================================================

    /// Get the device for a token, creating it when absent (touches `updated` otherwise)
    async fn device_from_token(&self, token: &str) -> Result<Device>;

    /// Update an existing device
    async fn update_device(&self, device: &Device) -> Result<Device>;

    /// Invitation bound to the device with this token
    async fn invitation_from_device_token(&self, token: &str) -> Result<Option<Invitation>>;

    /// Delete every device bound to an invitation
    async fn remove_devices_by_invitation(&self, invitation_id: &str) -> Result<()>;

    // ========================================================================
    // Health
    // ========================================================================

    /// Check connectivity to the backing store
    async fn health_check(&self) -> Result<bool>;
}

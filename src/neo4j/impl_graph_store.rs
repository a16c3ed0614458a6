//! `GraphStore` implementation for `Neo4jClient`.
//!
//! Every method simply delegates to the corresponding inherent method on `Neo4jClient`.

use async_trait::async_trait;
use std::collections::HashSet;

use super::client::Neo4jClient;
use super::models::*;
use super::traits::GraphStore;

#[async_trait]
impl GraphStore for Neo4jClient {
    // ========================================================================
    // Note documents
    // ========================================================================

    async fn get_note(&self, id: &str) -> anyhow::Result<Option<Note>> {
        self.get_note(id).await
    }

    async fn insert_note(&self, note: &Note) -> anyhow::Result<Note> {
        self.insert_note(note).await
    }

    async fn update_note(&self, note: &Note) -> anyhow::Result<Note> {
        self.update_note(note).await
    }

    async fn delete_note(&self, id: &str) -> anyhow::Result<()> {
        self.delete_note(id).await
    }

    // ========================================================================
    // Item edges
    // ========================================================================

    async fn remove_obsolete_note_items(
        &self,
        note_id: &str,
        items: &[String],
        refs: &[String],
    ) -> anyhow::Result<()> {
        self.remove_obsolete_note_items(note_id, items, refs).await
    }

    async fn ensure_note_items(
        &self,
        note_id: &str,
        items: &[String],
        refs: &[String],
    ) -> anyhow::Result<()> {
        self.ensure_note_items(note_id, items, refs).await
    }

    async fn list_note_items(&self, note_id: &str) -> anyhow::Result<Vec<ItemEdge>> {
        self.list_note_items(note_id).await
    }

    // ========================================================================
    // Access traversals
    // ========================================================================

    async fn invitation_ids_for_note(
        &self,
        note_id: &str,
        include_refs: bool,
    ) -> anyhow::Result<HashSet<String>> {
        self.invitation_ids_for_note(note_id, include_refs).await
    }

    async fn all_note_revs_by_invitation(
        &self,
        invitation_id: &str,
    ) -> anyhow::Result<Vec<NoteRev>> {
        self.all_note_revs_by_invitation(invitation_id).await
    }

    // ========================================================================
    // Invitations
    // ========================================================================

    async fn count_invitations(&self) -> anyhow::Result<usize> {
        self.count_invitations().await
    }

    async fn list_invitations(&self) -> anyhow::Result<Vec<Invitation>> {
        self.list_invitations().await
    }

    async fn get_invitation(&self, id: &str) -> anyhow::Result<Option<Invitation>> {
        self.get_invitation(id).await
    }

    async fn invitation_from_token(&self, token: &str) -> anyhow::Result<Option<Invitation>> {
        self.invitation_from_token(token).await
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> anyhow::Result<Invitation> {
        self.insert_invitation(invitation).await
    }

    async fn update_invitation(&self, invitation: &Invitation) -> anyhow::Result<Invitation> {
        self.update_invitation(invitation).await
    }

    async fn delete_invitation(&self, id: &str) -> anyhow::Result<()> {
        self.delete_invitation(id).await
    }

    async fn remove_invitation_from_all_notes(
        &self,
        invitation_id: &str,
    ) -> anyhow::Result<Vec<Note>> {
        self.remove_invitation_from_all_notes(invitation_id).await
    }

    // ========================================================================
    // Devices
    // ========================================================================

    async fn device_from_token(&self, token: &str) -> anyhow::Result<Device> {
        self.device_from_token(token).await
    }

    async fn update_device(&self, device: &Device) -> anyhow::Result<Device> {
        self.update_device(device).await
    }

    async fn invitation_from_device_token(
        &self,
        token: &str,
    ) -> anyhow::Result<Option<Invitation>> {
        self.invitation_from_device_token(token).await
    }

    async fn remove_devices_by_invitation(&self, invitation_id: &str) -> anyhow::Result<()> {
        self.remove_devices_by_invitation(invitation_id).await
    }

    // ========================================================================
    // Health
    // ========================================================================

    async fn health_check(&self) -> anyhow::Result<bool> {
        self.health_check().await
    }
}

//! Note Manager - writes notes and keeps their item edges consistent
//!
//! Every write goes through here so that a note's `items` / `ref` lists and
//! its outgoing edges never diverge.

use super::patch::NotePatch;
use crate::neo4j::models::Note;
use crate::neo4j::GraphStore;
use anyhow::Result;
use std::sync::Arc;

/// Manager for note writes
pub struct NoteManager {
    store: Arc<dyn GraphStore>,
}

impl NoteManager {
    /// Create a new NoteManager
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Insert a new note on behalf of `device`.
    ///
    /// Client supplied revision and timestamps are discarded.
    pub async fn insert(&self, device: Option<&str>, mut note: Note) -> Result<Note> {
        note.rev = None;
        note.created = None;
        note.updated = None;
        note.rev_src = device.map(str::to_string);

        let stored = self.store.insert_note(&note).await?;
        self.update_note_graph(&stored).await?;

        tracing::debug!(note_id = %stored.id, rev = ?stored.rev, "Inserted note");
        Ok(stored)
    }

    /// Apply `patch` onto the stored `current` note.
    ///
    /// Edges are reconciled only when the patch carries `items` or `ref`.
    pub async fn update(&self, device: Option<&str>, current: Note, patch: &NotePatch) -> Result<Note> {
        let mut note = current;
        patch.apply_to(&mut note);
        note.rev_src = device.map(str::to_string);

        let stored = self.store.update_note(&note).await?;
        if patch.touches_graph() {
            self.update_note_graph(&stored).await?;
        }

        tracing::debug!(note_id = %stored.id, rev = ?stored.rev, "Updated note");
        Ok(stored)
    }

    /// Make the outgoing edges of `note` match its `items` and `ref` lists
    pub async fn update_note_graph(&self, note: &Note) -> Result<()> {
        self.store
            .remove_obsolete_note_items(&note.id, &note.items, &note.refs)
            .await?;
        self.store
            .ensure_note_items(&note.id, &note.items, &note.refs)
            .await?;
        Ok(())
    }

    /// For every ref of the given notes, make sure the target refs back.
    ///
    /// Returns the target notes that had to be changed, latest revision only.
    pub async fn ensure_bidirectional_note_refs(&self, note_ids: &[String]) -> Result<Vec<Note>> {
        let mut repaired: Vec<Note> = Vec::new();

        for id in note_ids {
            let Some(note) = self.store.get_note(id).await? else {
                continue;
            };
            for target_id in note.refs.iter().filter(|r| *r != id) {
                let Some(mut target) = self.store.get_note(target_id).await? else {
                    continue;
                };
                if target.refs.contains(id) {
                    continue;
                }

                target.refs.push(id.clone());
                let stored = self.store.update_note(&target).await?;
                self.update_note_graph(&stored).await?;
                tracing::debug!(note_id = %stored.id, referrer = %id, "Added reverse ref");

                match repaired.iter_mut().find(|n| n.id == stored.id) {
                    Some(existing) => *existing = stored,
                    None => repaired.push(stored),
                }
            }
        }

        Ok(repaired)
    }
}

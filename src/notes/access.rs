//! Access resolution over the note graph
//!
//! A note's access set is its steward and invitations plus those of every
//! ancestor reachable through item edges. Ref edges grant view access for one
//! hop and never propagate further up.

use super::patch::NotePatch;
use crate::neo4j::models::{Invitation, Note, NoteRev};
use crate::neo4j::GraphStore;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// Answers "who may see or edit this note" questions
pub struct AccessResolver {
    store: Arc<dyn GraphStore>,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Invitation ids with access to a note.
    ///
    /// Empty when the note has no path to any invitation, which callers treat
    /// as "not yet owned" rather than "denied".
    pub async fn invitation_ids_for_note(
        &self,
        note_id: &str,
        include_refs: bool,
    ) -> Result<HashSet<String>> {
        self.store.invitation_ids_for_note(note_id, include_refs).await
    }

    /// Invitation documents with access to a note, tokens removed
    pub async fn invitations_for_note(
        &self,
        note_id: &str,
        include_refs: bool,
    ) -> Result<Vec<Invitation>> {
        let ids = self.invitation_ids_for_note(note_id, include_refs).await?;
        let mut invitations = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(invitation) = self.store.get_invitation(&id).await? {
                invitations.push(invitation.redacted());
            }
        }
        invitations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(invitations)
    }

    pub async fn can_edit(&self, invitation_id: &str, note: &Note) -> Result<bool> {
        if note.is_direct_member(invitation_id) {
            return Ok(true);
        }
        Ok(self
            .invitation_ids_for_note(&note.id, false)
            .await?
            .contains(invitation_id))
    }

    pub async fn can_view(&self, invitation_id: &str, note: &Note) -> Result<bool> {
        if note.is_direct_member(invitation_id) {
            return Ok(true);
        }
        Ok(self
            .invitation_ids_for_note(&note.id, true)
            .await?
            .contains(invitation_id))
    }

    /// Whether applying `proposed` would link a note that `invitation_id`
    /// cannot already reach.
    ///
    /// Only targets added relative to `current` are checked (all of them when
    /// `current` is `None`). A target whose access set is empty is neutral.
    pub async fn changes_access(
        &self,
        invitation_id: &str,
        current: Option<&Note>,
        proposed: &NotePatch,
    ) -> Result<bool> {
        let checks = [
            (
                proposed.items.as_deref(),
                current.map(|n| n.items.as_slice()),
                false,
            ),
            (
                proposed.refs.as_deref(),
                current.map(|n| n.refs.as_slice()),
                true,
            ),
        ];

        for (wanted, existing, include_refs) in checks {
            let Some(wanted) = wanted else {
                continue;
            };
            let existing = existing.unwrap_or_default();
            for target in wanted.iter().filter(|id| !existing.contains(id)) {
                let access = self.invitation_ids_for_note(target, include_refs).await?;
                if !access.is_empty() && !access.contains(invitation_id) {
                    tracing::warn!(
                        note_id = %proposed.id,
                        target = %target,
                        invitation = %invitation_id,
                        "Link would change access of target note"
                    );
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Authorization snapshot of an invitation
    pub async fn all_note_revs_by_invitation(&self, invitation_id: &str) -> Result<Vec<NoteRev>> {
        self.store.all_note_revs_by_invitation(invitation_id).await
    }
}

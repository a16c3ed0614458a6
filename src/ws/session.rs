//! Per-connection sync protocol state machine
//!
//! A session starts `Unidentified`, becomes `Identified` after a successful
//! `identify` and ends `Closed` when identification fails. Frames are handled
//! one at a time by the owning connection task.

use super::error::SyncError;
use super::protocol::{
    decode_frame, redact_steward, IncomingAction, OutgoingEvent, SyncOutgoing,
};
use super::SyncContext;
use crate::neo4j::models::{Invitation, ItemLink, StateEntry, StoreError};
use crate::notes::NotePatch;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Fields a client may send that are never stored from a patch
const IGNORED_PATCH_FIELDS: [&str; 4] = ["steward", "created", "updated", "revSrc"];

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unidentified,
    Identified {
        invitation: Invitation,
        device_token: String,
    },
    Closed,
}

/// Result of syncing one note of a batch
#[derive(Debug, Default)]
struct NoteOutcome {
    echo: Option<StateEntry>,
    push: Option<OutgoingEvent>,
}

pub struct WsSession {
    id: Uuid,
    state: SessionState,
    ctx: Arc<SyncContext>,
}

impl WsSession {
    pub fn new(id: Uuid, ctx: Arc<SyncContext>) -> Self {
        Self {
            id,
            state: SessionState::Unidentified,
            ctx,
        }
    }

    /// A session that is already identified, used to run actions sent over HTTP
    /// on behalf of an open connection
    pub fn identified(
        id: Uuid,
        invitation: Invitation,
        device_token: String,
        ctx: Arc<SyncContext>,
    ) -> Self {
        Self {
            id,
            state: SessionState::Identified {
                invitation,
                device_token,
            },
            ctx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Handle one text frame and return the events to send back.
    ///
    /// Fails with `IdentifyFailure` (fatal, the session is then closed and
    /// the replies produced so far ride along in the error) or with a store
    /// error that aborts the rest of the frame.
    pub async fn receive(&mut self, text: &str) -> Result<Vec<OutgoingEvent>, SyncError> {
        let actions = match decode_frame(text) {
            Ok(actions) => actions,
            Err(e) => {
                warn!(session = %self.id, "{}", e);
                return Ok(Vec::new());
            }
        };

        let mut events = Vec::new();
        for action in actions {
            if self.is_closed() {
                break;
            }

            if let IncomingAction::Identify(payload) = action {
                match self.identify(&payload.device).await {
                    Ok(reply) => events.extend(reply),
                    Err(SyncError::IdentifyFailure { .. }) => {
                        return Err(SyncError::IdentifyFailure { pending: events })
                    }
                    Err(e) => return Err(e),
                }
                continue;
            }

            let SessionState::Identified {
                invitation,
                device_token,
            } = &self.state
            else {
                warn!(session = %self.id, action = action.name(), "Action before identify ignored");
                continue;
            };
            let me = invitation.id.clone();
            let device = device_token.clone();

            match action {
                IncomingAction::State(payload) => {
                    events.extend(self.state_snapshot(&me, payload.notes).await?)
                }
                IncomingAction::Sync(payload) => {
                    events.extend(self.sync(&me, &device, payload.notes).await?)
                }
                IncomingAction::Get(payload) => {
                    events.extend(self.get(&me, payload.notes).await?)
                }
                IncomingAction::Identify(_) => {}
            }
        }

        Ok(events)
    }

    async fn identify(&mut self, device_token: &str) -> Result<Vec<OutgoingEvent>, SyncError> {
        match self.ctx.devices.resolve(device_token).await? {
            Some(invitation) => {
                self.ctx
                    .registry
                    .identify(self.id, &invitation.id, device_token)
                    .await;
                debug!(session = %self.id, invitation = %invitation.id, "Session identified");
                let reply = OutgoingEvent::Identify {
                    invitation: invitation.redacted(),
                };
                self.state = SessionState::Identified {
                    invitation,
                    device_token: device_token.to_string(),
                };
                Ok(vec![reply])
            }
            None => {
                warn!(session = %self.id, "Identify with a device that has no invitation");
                self.state = SessionState::Closed;
                Err(SyncError::IdentifyFailure {
                    pending: Vec::new(),
                })
            }
        }
    }

    /// Full resync against what the client reports it holds
    async fn state_snapshot(
        &self,
        me: &str,
        client_notes: Vec<(String, Option<String>)>,
    ) -> Result<Vec<OutgoingEvent>, SyncError> {
        let known: HashMap<String, Option<String>> = client_notes.into_iter().collect();
        let all = self.ctx.access.all_note_revs_by_invitation(me).await?;
        let authorized: HashSet<&str> = all.iter().map(|r| r.id.as_str()).collect();
        let redact = self.ctx.config.redaction.state;

        let mut notes = Vec::new();
        for rev in &all {
            let unchanged = known
                .get(&rev.id)
                .is_some_and(|client_rev| client_rev.as_deref() == Some(rev.rev.as_str()));
            if unchanged {
                continue;
            }
            if let Some(note) = self.ctx.store.get_note(&rev.id).await? {
                notes.push(redact_steward(note.to_json(), redact));
            }
        }

        let mut gone: Vec<String> = known
            .keys()
            .filter(|id| !authorized.contains(id.as_str()))
            .cloned()
            .collect();
        gone.sort();

        let view: Vec<String> = all
            .iter()
            .filter(|r| r.access == ItemLink::Ref)
            .map(|r| r.id.clone())
            .collect();

        debug!(
            session = %self.id,
            changed = notes.len(),
            gone = gone.len(),
            view = view.len(),
            "State snapshot"
        );

        Ok(vec![OutgoingEvent::Sync(SyncOutgoing {
            notes,
            gone: Some(gone),
            view: Some(view),
            full: Some(true),
        })])
    }

    /// Documents the invitation may view, in request order
    async fn get(&self, me: &str, ids: Vec<String>) -> Result<Vec<OutgoingEvent>, SyncError> {
        let redact = self.ctx.config.redaction.get;
        let mut notes = Vec::new();
        for id in ids {
            let Some(note) = self.ctx.store.get_note(&id).await? else {
                continue;
            };
            if self.ctx.access.can_view(me, &note).await? {
                notes.push(redact_steward(note.to_json(), redact));
            }
        }
        Ok(vec![OutgoingEvent::Get { notes }])
    }

    /// Apply a batch of client changes.
    ///
    /// The `state` echo comes first and only lists accepted notes; pushes of
    /// server copies and steward notices follow.
    async fn sync(
        &self,
        me: &str,
        device: &str,
        objects: Vec<Map<String, Value>>,
    ) -> Result<Vec<OutgoingEvent>, SyncError> {
        let mut echoes: Vec<StateEntry> = Vec::new();
        let mut pushes: Vec<OutgoingEvent> = Vec::new();

        for object in objects {
            match self.sync_note(me, device, object).await {
                Ok(outcome) => {
                    echoes.extend(outcome.echo);
                    pushes.extend(outcome.push);
                }
                Err(e) => {
                    if let Some(current) = e.server_copy() {
                        warn!(session = %self.id, invitation = %me, "{}; pushing server copy", e);
                        pushes.push(OutgoingEvent::note(current.to_json()));
                    } else if let SyncError::Store(cause) = &e {
                        error!(session = %self.id, "Store failure during sync: {:#}", cause);
                    } else {
                        warn!(session = %self.id, "Note dropped: {}", e);
                    }
                }
            }
        }

        let echoed: Vec<String> = echoes.iter().map(|e| e.id().to_string()).collect();
        match self.ctx.notes.ensure_bidirectional_note_refs(&echoed).await {
            Ok(repaired) => {
                for note in repaired {
                    self.ctx.registry.note_changed(None, note.ref_payload());
                }
            }
            Err(e) => error!(session = %self.id, "Failed to repair reverse refs: {:#}", e),
        }

        let mut events = Vec::with_capacity(pushes.len() + 1);
        if !echoes.is_empty() {
            events.push(OutgoingEvent::State { notes: echoes });
        }
        events.extend(pushes);
        Ok(events)
    }

    async fn sync_note(
        &self,
        me: &str,
        device: &str,
        object: Map<String, Value>,
    ) -> Result<NoteOutcome, SyncError> {
        let patch =
            NotePatch::from_json(&object).map_err(|e| SyncError::Protocol(format!("note: {}", e)))?;
        let current = self.ctx.store.get_note(&patch.id).await?;

        if self
            .ctx
            .access
            .changes_access(me, current.as_ref(), &patch)
            .await?
        {
            warn!(session = %self.id, note_id = %patch.id, "Change would alter access, dropped");
            return Ok(NoteOutcome::default());
        }

        let Some(current) = current else {
            return self.insert_note(me, device, &patch).await;
        };

        if patch.rev != current.rev {
            return Err(SyncError::RevisionConflict {
                client_rev: patch.rev,
                current: Box::new(current),
            });
        }
        if !self.ctx.access.can_edit(me, &current).await? {
            return Err(SyncError::PermissionDenied {
                invitation: me.to_string(),
                current: Box::new(current),
            });
        }

        let updated = self
            .ctx
            .notes
            .update(Some(device), current, &patch)
            .await
            .map_err(|e| {
                if StoreError::is_not_found(&e) {
                    SyncError::NotFound(patch.id.clone())
                } else {
                    SyncError::Store(e)
                }
            })?;

        let mut payload = object;
        for field in IGNORED_PATCH_FIELDS {
            payload.remove(field);
        }
        payload.insert("rev".to_string(), Value::from(updated.rev.clone()));
        self.ctx
            .registry
            .note_changed(Some(me.to_string()), Value::Object(payload));

        Ok(NoteOutcome {
            echo: Some(updated.to_state_entry(patch.rev.clone())),
            push: None,
        })
    }

    async fn insert_note(
        &self,
        me: &str,
        device: &str,
        patch: &NotePatch,
    ) -> Result<NoteOutcome, SyncError> {
        let inserted = self
            .ctx
            .notes
            .insert(Some(device), patch.to_new_note(me))
            .await?;

        let broadcast = redact_steward(inserted.to_json(), self.ctx.config.redaction.broadcast_new);
        self.ctx
            .registry
            .note_changed(Some(me.to_string()), broadcast);

        Ok(NoteOutcome {
            echo: Some(inserted.to_state_entry(patch.rev.clone())),
            push: Some(OutgoingEvent::note(inserted.steward_payload())),
        })
    }
}

impl std::fmt::Debug for WsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

//! Live session registry and change fan-out
//!
//! Every connection registers an unbounded outbound channel here. Broadcasts
//! only ever `send` on those channels, so a slow client never blocks the
//! session that caused the change. The session map sits behind a single mutex.

use super::protocol::OutgoingEvent;
use crate::notes::AccessResolver;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Receiving half of a session's outbound channel
pub type Outbound = mpsc::UnboundedReceiver<Vec<OutgoingEvent>>;

struct SessionEntry {
    invitation: Option<String>,
    device_token: Option<String>,
    outbound: mpsc::UnboundedSender<Vec<OutgoingEvent>>,
}

/// A registered session bound to an invitation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedSession {
    pub id: Uuid,
    pub invitation: String,
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    access: Arc<AccessResolver>,
}

impl SessionRegistry {
    pub fn new(access: Arc<AccessResolver>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            access,
        }
    }

    /// Register a new, unidentified session
    pub async fn connect(&self) -> (Uuid, Outbound) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().await.insert(
            id,
            SessionEntry {
                invitation: None,
                device_token: None,
                outbound: tx,
            },
        );
        tracing::debug!(session = %id, "Session connected");
        (id, rx)
    }

    /// Remove a session; a no-op when it is already gone
    pub async fn disconnect(&self, id: Uuid) {
        if self.sessions.lock().await.remove(&id).is_some() {
            tracing::debug!(session = %id, "Session disconnected");
        }
    }

    /// Record the invitation a session identified as
    pub async fn identify(&self, id: Uuid, invitation_id: &str, device_token: &str) {
        if let Some(entry) = self.sessions.lock().await.get_mut(&id) {
            entry.invitation = Some(invitation_id.to_string());
            entry.device_token = Some(device_token.to_string());
        }
    }

    /// The identified session opened by a device, if any
    pub async fn session_by_device(&self, device_token: &str) -> Option<IdentifiedSession> {
        self.sessions
            .lock()
            .await
            .iter()
            .find(|(_, entry)| entry.device_token.as_deref() == Some(device_token))
            .and_then(|(id, entry)| {
                entry.invitation.as_ref().map(|invitation| IdentifiedSession {
                    id: *id,
                    invitation: invitation.clone(),
                })
            })
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Fan a changed note out to every session that can view it, except the
    /// sessions of the originating invitation.
    ///
    /// Returns immediately; delivery runs on its own task.
    pub fn note_changed(self: &Arc<Self>, origin: Option<String>, payload: Value) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            registry.deliver_note_change(origin.as_deref(), payload).await;
        });
    }

    /// Push `payload` to the permitted sessions; returns how many were reached
    pub async fn deliver_note_change(&self, origin: Option<&str>, payload: Value) -> usize {
        let Some(note_id) = payload.get("id").and_then(Value::as_str) else {
            tracing::warn!("Note change without id, not broadcast");
            return 0;
        };

        let permitted = match self.access.invitation_ids_for_note(note_id, true).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(note_id = %note_id, "Failed to resolve note access for broadcast: {:#}", e);
                return 0;
            }
        };

        let sessions = self.sessions.lock().await;
        let mut delivered = 0;
        for entry in sessions.values() {
            let Some(invitation) = &entry.invitation else {
                continue;
            };
            if Some(invitation.as_str()) == origin || !permitted.contains(invitation) {
                continue;
            }
            if entry
                .outbound
                .send(vec![OutgoingEvent::note(payload.clone())])
                .is_ok()
            {
                delivered += 1;
            }
        }

        tracing::debug!(note_id = %note_id, recipients = delivered, "Broadcast note change");
        delivered
    }

    /// Ask every identified session not bound to `changed_by` to reload invitations
    pub async fn invitations_changed(&self, changed_by: Option<&str>) -> usize {
        let sessions = self.sessions.lock().await;
        let mut delivered = 0;
        for entry in sessions.values() {
            let Some(invitation) = &entry.invitation else {
                continue;
            };
            if Some(invitation.as_str()) == changed_by {
                continue;
            }
            if entry
                .outbound
                .send(vec![OutgoingEvent::reload_invitations()])
                .is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }
}

//! Errors raised while handling sync actions

use super::protocol::OutgoingEvent;
use crate::neo4j::models::Note;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("note {0} not found")]
    NotFound(String),

    #[error("invitation {invitation} may not edit note {}", .current.id)]
    PermissionDenied {
        invitation: String,
        current: Box<Note>,
    },

    #[error("stale revision {client_rev:?} for note {} (server has {:?})", .current.id, .current.rev)]
    RevisionConflict {
        client_rev: Option<String>,
        current: Box<Note>,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    /// `pending` holds replies produced earlier in the same frame
    #[error("no invitation for device")]
    IdentifyFailure { pending: Vec<OutgoingEvent> },

    #[error("store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    /// Whether the connection must be closed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IdentifyFailure { .. })
    }

    /// Replies still owed to the client before a fatal close
    pub fn into_pending(self) -> Vec<OutgoingEvent> {
        match self {
            Self::IdentifyFailure { pending } => pending,
            _ => Vec::new(),
        }
    }

    /// Server copy to push back to the client after a rejected change
    pub fn server_copy(&self) -> Option<&Note> {
        match self {
            Self::PermissionDenied { current, .. } | Self::RevisionConflict { current, .. } => {
                Some(&**current)
            }
            _ => None,
        }
    }
}

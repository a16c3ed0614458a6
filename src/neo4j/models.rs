//! Graph documents: notes, item edges, invitations and devices
//!
//! Field names follow the wire format used by clients (camelCase), so the
//! same types are serialized to the socket, to REST responses and into the
//! `doc` property of a `:Note` node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum number of inbound hops followed by access traversals
pub const MAX_TRAVERSAL_DEPTH: usize = 99;

// ============================================================================
// Revisions
// ============================================================================

/// Produce the revision that follows `previous`.
///
/// Revisions look like `"<generation>-<nonce>"`. Clients treat them as opaque
/// strings; the generation keeps them monotonic per document.
pub fn next_revision(previous: Option<&str>) -> String {
    let generation = previous
        .and_then(|rev| rev.split('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{}-{}", generation, &nonce[..8])
}

/// Generate a server-side document id
pub fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ============================================================================
// Notes
// ============================================================================

/// Display options of a note
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumerate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert_text: Option<bool>,
}

/// A note vertex
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub rev: Option<String>,
    /// Invitation that created the note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steward: Option<String>,
    /// Invitations granted direct access
    #[serde(default)]
    pub invitations: Vec<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Child notes, in order
    #[serde(default)]
    pub items: Vec<String>,
    /// Referenced notes, in order
    #[serde(default, rename = "ref")]
    pub refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<NoteOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
    /// Device token that produced the current revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl Note {
    /// Create an empty note with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Full JSON document of this note
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Build a `[id, rev, oldRev]` entry for a state echo
    pub fn to_state_entry(&self, old_rev: Option<String>) -> StateEntry {
        StateEntry(
            self.id.clone(),
            self.rev.clone().unwrap_or_default(),
            old_rev,
        )
    }

    /// Minimal `{id, rev, ref}` payload used when only the references changed
    pub fn ref_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "rev": self.rev,
            "ref": self.refs,
        })
    }

    /// Minimal `{id, rev, steward}` payload used to tell a creator who owns a note
    pub fn steward_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "rev": self.rev,
            "steward": self.steward,
        })
    }

    /// Whether the invitation owns or is directly listed on this note
    pub fn is_direct_member(&self, invitation: &str) -> bool {
        self.steward.as_deref() == Some(invitation) || self.invitations.iter().any(|i| i == invitation)
    }
}

/// `[id, newRev, oldRev]` as sent in a `state` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry(pub String, pub String, pub Option<String>);

impl StateEntry {
    pub fn id(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Item edges
// ============================================================================

/// Kind of link between two notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemLink {
    /// Strong containment (child note)
    Item,
    /// Weak cross-reference
    Ref,
}

impl fmt::Display for ItemLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item => write!(f, "item"),
            Self::Ref => write!(f, "ref"),
        }
    }
}

impl FromStr for ItemLink {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "item" => Ok(Self::Item),
            "ref" => Ok(Self::Ref),
            _ => Err(format!("Unknown item link: {}", s)),
        }
    }
}

/// Edge from a note to one of its items or references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEdge {
    pub from: String,
    pub to: String,
    pub link: ItemLink,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// Id, revision and access kind of a note visible to an invitation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRev {
    pub id: String,
    pub rev: String,
    /// `Item` when reachable through containment only, `Ref` when view-only
    pub access: ItemLink,
}

// ============================================================================
// Invitations and devices
// ============================================================================

/// An identity that can be granted access to notes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    /// Secret used to connect a device to this invitation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_steward: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl Invitation {
    /// Copy of this invitation with the token removed
    pub fn redacted(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }
}

/// A client device bound (or not yet bound) to an invitation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

// ============================================================================
// Store errors
// ============================================================================

/// Kind of document addressed by a store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Note,
    Invitation,
    Device,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note => write!(f, "note"),
            Self::Invitation => write!(f, "invitation"),
            Self::Device => write!(f, "device"),
        }
    }
}

/// Typed store failures, carried inside `anyhow::Error`
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: DocumentKind, id: String },
}

impl StoreError {
    pub fn not_found(kind: DocumentKind, id: impl Into<String>) -> anyhow::Error {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
        .into()
    }

    /// Whether an `anyhow::Error` is a `NotFound` store error
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound { .. })
        )
    }
}

//! Wire format of the sync channel
//!
//! A frame is a JSON array of `[action, payload]` pairs, in both directions:
//!
//! ```text
//! [["identify", {"device": "…"}], ["state", {"notes": [["id", "rev"]]}]]
//! ```

use super::error::SyncError;
use crate::neo4j::models::{Invitation, StateEntry};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

// ============================================================================
// Incoming
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct IdentifyPayload {
    pub device: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatePayload {
    /// `[id, rev]` pairs the client already holds
    #[serde(default)]
    pub notes: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncPayload {
    /// Partial notes; each must carry `id` and the `rev` it was based on
    #[serde(default)]
    pub notes: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetPayload {
    #[serde(default)]
    pub notes: Vec<String>,
}

/// One decoded inbound action
#[derive(Debug, Clone)]
pub enum IncomingAction {
    Identify(IdentifyPayload),
    State(StatePayload),
    Sync(SyncPayload),
    Get(GetPayload),
}

impl IncomingAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identify(_) => "identify",
            Self::State(_) => "state",
            Self::Sync(_) => "sync",
            Self::Get(_) => "get",
        }
    }

    fn decode(action: &str, payload: Value) -> Result<Option<Self>, SyncError> {
        let malformed = |e: serde_json::Error| SyncError::Protocol(format!("{} payload: {}", action, e));
        let decoded = match action {
            "identify" => Self::Identify(serde_json::from_value(payload).map_err(malformed)?),
            "state" => Self::State(serde_json::from_value(payload).map_err(malformed)?),
            "sync" => Self::Sync(serde_json::from_value(payload).map_err(malformed)?),
            "get" => Self::Get(serde_json::from_value(payload).map_err(malformed)?),
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }
}

/// Decode a text frame into its actions.
///
/// A frame that is not a JSON array is an error. Unknown actions and
/// malformed pairs are logged and skipped.
pub fn decode_frame(text: &str) -> Result<Vec<IncomingAction>, SyncError> {
    let frame: Value = serde_json::from_str(text)
        .map_err(|e| SyncError::Protocol(format!("invalid JSON frame: {}", e)))?;
    let Value::Array(pairs) = frame else {
        return Err(SyncError::Protocol("frame is not an array".to_string()));
    };

    let mut actions = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let Value::Array(mut pair) = pair else {
            tracing::warn!("Skipping frame element that is not an [action, payload] pair");
            continue;
        };
        if pair.len() < 2 {
            tracing::warn!("Skipping frame element without payload");
            continue;
        }
        let payload = pair.swap_remove(1);
        let Some(name) = pair[0].as_str() else {
            tracing::warn!("Skipping frame element with a non-string action");
            continue;
        };

        match IncomingAction::decode(name, payload) {
            Ok(Some(action)) => actions.push(action),
            Ok(None) => tracing::warn!(action = %name, "Unknown action"),
            Err(e) => tracing::warn!(action = %name, "{}", e),
        }
    }
    Ok(actions)
}

// ============================================================================
// Outgoing
// ============================================================================

/// Payload of an outgoing `sync`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncOutgoing {
    pub notes: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gone: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full: Option<bool>,
}

/// One outbound event, serialized as `[action, payload]`
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingEvent {
    Identify { invitation: Invitation },
    Sync(SyncOutgoing),
    State { notes: Vec<StateEntry> },
    Get { notes: Vec<Value> },
    Invitation { reload: bool },
}

impl OutgoingEvent {
    /// A `sync` carrying a single note
    pub fn note(note: Value) -> Self {
        Self::Sync(SyncOutgoing {
            notes: vec![note],
            ..Default::default()
        })
    }

    /// Tell a client to reload its invitation list
    pub fn reload_invitations() -> Self {
        Self::Invitation { reload: true }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::Identify { .. } => "identify",
            Self::Sync(_) => "sync",
            Self::State { .. } => "state",
            Self::Get { .. } => "get",
            Self::Invitation { .. } => "invitation",
        }
    }

    fn payload(&self) -> Value {
        match self {
            Self::Identify { invitation } => serde_json::json!({ "invitation": invitation }),
            Self::Sync(sync) => serde_json::to_value(sync).unwrap_or(Value::Null),
            Self::State { notes } => serde_json::json!({ "notes": notes }),
            Self::Get { notes } => serde_json::json!({ "notes": notes }),
            Self::Invitation { reload } => serde_json::json!({ "reload": reload }),
        }
    }
}

impl Serialize for OutgoingEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.action(), self.payload()).serialize(serializer)
    }
}

/// Encode events as one text frame
pub fn encode_frame(events: &[OutgoingEvent]) -> Result<String, serde_json::Error> {
    serde_json::to_string(events)
}

// ============================================================================
// Redaction
// ============================================================================

/// Where the `steward` field is stripped from outgoing notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionPolicy {
    /// Broadcast of a newly created note to other sessions
    pub broadcast_new: bool,
    /// Documents returned by `get`
    pub get: bool,
    /// Documents returned by a `state` resync
    pub state: bool,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            broadcast_new: true,
            get: false,
            state: false,
        }
    }
}

/// Remove the `steward` field from a note document when `enabled`
pub fn redact_steward(mut note: Value, enabled: bool) -> Value {
    if enabled {
        if let Some(object) = note.as_object_mut() {
            object.remove("steward");
        }
    }
    note
}

//! Real-time sync channel
//!
//! Per-connection protocol sessions, the wire format they speak, and the
//! registry that fans note changes out to other sessions.

pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;

pub use error::SyncError;
pub use protocol::{OutgoingEvent, RedactionPolicy};
pub use registry::SessionRegistry;
pub use session::WsSession;

use crate::auth::DeviceResolver;
use crate::neo4j::GraphStore;
use crate::notes::{AccessResolver, NoteManager};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sync channel settings (`sync` section of config.yaml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between WebSocket pings
    pub ws_ping_secs: u64,
    pub redaction: RedactionPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ws_ping_secs: 15,
            redaction: RedactionPolicy::default(),
        }
    }
}

/// Services shared by every session, constructed once at startup
pub struct SyncContext {
    pub store: Arc<dyn GraphStore>,
    pub access: Arc<AccessResolver>,
    pub notes: NoteManager,
    pub devices: DeviceResolver,
    pub registry: Arc<SessionRegistry>,
    pub config: SyncConfig,
}

impl SyncContext {
    pub fn new(store: Arc<dyn GraphStore>, config: SyncConfig) -> Arc<Self> {
        let access = Arc::new(AccessResolver::new(store.clone()));
        Arc::new(Self {
            notes: NoteManager::new(store.clone()),
            devices: DeviceResolver::new(store.clone()),
            registry: Arc::new(SessionRegistry::new(access.clone())),
            access,
            store,
            config,
        })
    }
}

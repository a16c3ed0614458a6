//! Device authentication
//!
//! Clients authenticate with an opaque device token. A device is bound to at
//! most one invitation; the very first device seen by an empty store becomes
//! the steward.

pub mod bootstrap;
pub mod extractor;
pub mod middleware;
pub mod names;
pub mod token;

pub use bootstrap::DeviceResolver;
pub use extractor::InvitationPrincipal;

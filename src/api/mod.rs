//! HTTP API for the note graph

pub mod handlers;
pub mod invitation_handlers;
pub mod me_handlers;
pub mod note_handlers;
pub mod routes;
pub mod sync_handlers;
pub mod ws_handlers;

pub use routes::create_router;

//! Notes module
//!
//! Access resolution over the note graph, partial updates sent by clients,
//! and the mutator that keeps a note's edges in step with its lists.

pub mod access;
pub mod manager;
pub mod patch;

pub use access::AccessResolver;
pub use manager::NoteManager;
pub use patch::NotePatch;

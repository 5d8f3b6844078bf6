//! Stack model and the collaborator interfaces the core consumes.

pub mod path;
pub mod project;
pub mod refs;
pub mod types;

pub use project::{Input, Project, SharingBackend};
pub use refs::{resolve_refs, TagQuery};
pub use types::Stack;

//! Idea storage, validation and status tracking.

pub mod store;

pub use store::{IdeaError, IdeaStore};

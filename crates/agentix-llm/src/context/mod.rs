//! Shared context window
//!
//! A bounded, append-ordered message log that several backends contribute
//! to through the router, so one backend's answer becomes the next one's
//! input.
//!
//! # Module Structure
//!
//! - `message`: the stored record and its read-only projections
//! - `window`: [`SharedContextWindow`], eviction, summaries
//! - `snapshot`: persisted form and restore

mod message;
mod snapshot;
mod window;


pub use message::{ContextMessage, MessageFormat, ProjectedMessage};
pub use snapshot::{SnapshotMetadata, WindowSnapshot};
pub use window::{BackendContribution, ContextSummary, SharedContextWindow};

//! Version store: append-only per-file event logs
//!
//! This crate provides:
//! - File event records (`FileEvent`, keyed by `FileId`)
//! - Per-file histories with merge semantics (`FileHistory`, `ReplayAction`)
//! - The version list with its by-id and by-name views (`VersionList`)

pub mod event;
pub mod history;
pub mod list;

// Re-exports
pub use event::{EventId, EventKind, FileEvent, FileId};
pub use history::{FileHistory, ReplayAction};
pub use list::{lists_equal, VersionList};

/// Result type for version-store operations
pub type Result<T> = anyhow::Result<T>;

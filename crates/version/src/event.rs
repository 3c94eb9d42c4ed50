//! File event records

use distribox_core::{Sha1Hash, Ticks};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a tracked file
///
/// Assigned once, when the file first appears on any peer, and carried
/// across renames, re-creations and replication. Two files at the same
/// path on different peers are distinct identities until a merge makes
/// them otherwise.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Allocate a fresh random identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique identifier of a single event
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened to the file
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Changed,
    Renamed,
    Deleted,
}

/// One immutable entry in a file's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEvent {
    /// Identity of the file this event belongs to
    pub file_id: FileId,
    /// Identity of this event
    pub event_id: EventId,
    /// The event that was the history's head when this one was appended.
    /// None only for the first event. Not consulted by merge logic yet;
    /// kept for future reconciliation.
    pub parent_event_id: Option<EventId>,
    /// Copied unchanged from the history's first event
    pub is_directory: bool,
    /// Path relative to the sync root, forward-slash joined
    pub name: String,
    /// 100-nanosecond tick timestamp, UTC
    pub when: Ticks,
    /// Content digest at this event; None for directories and
    /// created-empty files
    pub sha1: Option<Sha1Hash>,
    /// Byte length of the blob under `sha1`, else 0
    pub size: u64,
    /// Event type
    pub kind: EventKind,
}

impl FileEvent {
    /// Construct an event with a fresh `event_id`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_id: FileId,
        parent_event_id: Option<EventId>,
        is_directory: bool,
        name: String,
        when: Ticks,
        sha1: Option<Sha1Hash>,
        size: u64,
        kind: EventKind,
    ) -> Self {
        Self {
            file_id,
            event_id: EventId::new(),
            parent_event_id,
            is_directory,
            name,
            when,
            sha1,
            size,
            kind,
        }
    }
}

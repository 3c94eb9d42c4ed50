//! Per-file event history
//!
//! A history is an ordered, append-only log of events for one `FileId`.
//! Local appends arrive with strictly increasing timestamps, so the log
//! grows at the tail; merged foreign events may land anywhere, which is
//! why every insertion re-sorts (stably) by `when`.

use crate::event::{EventId, EventKind, FileEvent, FileId};
use anyhow::Result;
use distribox_core::{Sha1Hash, Ticks};
use serde::{Deserialize, Serialize};

/// Filesystem work a merged event implies for the local working tree
///
/// Returned by [`FileHistory::merge`]; executing it (and muting the
/// detector while doing so) is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayAction {
    /// Nothing to do: the event is historical, or already known
    None,
    /// Create a directory at `name`
    CreateDir { name: String },
    /// Write a file at `name`: empty when `sha1` is None, otherwise the
    /// blob's content, overwriting whatever is there
    WriteFile { name: String, sha1: Option<Sha1Hash> },
    /// Rename `from` to `to`
    Move { from: String, to: String },
    /// Remove the directory at `name`
    RemoveDir { name: String },
    /// Remove the file at `name`
    RemoveFile { name: String },
}

/// Ordered log of events for one file identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHistory {
    file_id: FileId,
    events: Vec<FileEvent>,
}

impl FileHistory {
    /// Construct an empty history for a known identity
    pub fn new(file_id: FileId) -> Self {
        Self {
            file_id,
            events: Vec::new(),
        }
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn events(&self) -> &[FileEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The head event: the one whose state the working tree reflects
    pub fn current(&self) -> Option<&FileEvent> {
        self.events.last()
    }

    /// Current path of the file, relative to the sync root
    pub fn current_name(&self) -> Option<&str> {
        self.current().map(|e| e.name.as_str())
    }

    pub fn current_sha1(&self) -> Option<Sha1Hash> {
        self.current().and_then(|e| e.sha1)
    }

    pub fn current_size(&self) -> u64 {
        self.current().map(|e| e.size).unwrap_or(0)
    }

    /// Whether this history tracks a directory (fixed at the first event)
    pub fn is_directory(&self) -> bool {
        self.events.first().map(|e| e.is_directory).unwrap_or(false)
    }

    /// A history is alive until its last event is a tombstone
    pub fn is_alive(&self) -> bool {
        matches!(self.current(), Some(e) if e.kind != EventKind::Deleted)
    }

    pub fn contains_event(&self, id: EventId) -> bool {
        self.events.iter().any(|e| e.event_id == id)
    }

    /// First event: the file came into being
    pub fn create(&mut self, name: &str, is_directory: bool, when: Ticks) -> Result<()> {
        if !self.events.is_empty() {
            anyhow::bail!(
                "Create on non-empty history {} (current: {:?})",
                self.file_id,
                self.current_name()
            );
        }
        self.events.push(FileEvent::new(
            self.file_id,
            None,
            is_directory,
            name.to_string(),
            when,
            None,
            0,
            EventKind::Created,
        ));
        Ok(())
    }

    /// Append Renamed, carrying content fields over from the head
    pub fn rename(&mut self, new_name: &str, when: Ticks) -> Result<()> {
        let head = self.require_head("Rename")?;
        let event = FileEvent::new(
            self.file_id,
            Some(head.event_id),
            head.is_directory,
            new_name.to_string(),
            when,
            head.sha1,
            head.size,
            EventKind::Renamed,
        );
        self.append_sorted(event);
        Ok(())
    }

    /// Append Changed with new content; `size` must be the blob's byte
    /// length (0 when `sha1` is None)
    pub fn change(&mut self, sha1: Option<Sha1Hash>, size: u64, when: Ticks) -> Result<()> {
        let head = self.require_head("Change")?;
        let size = if sha1.is_none() { 0 } else { size };
        let event = FileEvent::new(
            self.file_id,
            Some(head.event_id),
            head.is_directory,
            head.name.clone(),
            when,
            sha1,
            size,
            EventKind::Changed,
        );
        self.append_sorted(event);
        Ok(())
    }

    /// Append the Deleted tombstone, carrying name and content fields over
    pub fn delete(&mut self, when: Ticks) -> Result<()> {
        let head = self.require_head("Delete")?;
        let event = FileEvent::new(
            self.file_id,
            Some(head.event_id),
            head.is_directory,
            head.name.clone(),
            when,
            head.sha1,
            head.size,
            EventKind::Deleted,
        );
        self.append_sorted(event);
        Ok(())
    }

    /// Append a foreign event, returning the replay the working tree needs
    ///
    /// Events already present (by `event_id`) are skipped, which is what
    /// makes accepting the same bundle twice a no-op. An event that does
    /// not become the new head is recorded but replays nothing: the
    /// working tree already reflects a later state.
    pub fn merge(&mut self, event: FileEvent) -> Result<ReplayAction> {
        if self.contains_event(event.event_id) {
            return Ok(ReplayAction::None);
        }

        if self.events.is_empty() {
            if event.kind != EventKind::Created {
                anyhow::bail!(
                    "First event of foreign history {} is {:?}, expected Created",
                    event.file_id,
                    event.kind
                );
            }
            // Adopt identity and kind from the event
            self.file_id = event.file_id;
            let action = if event.is_directory {
                ReplayAction::CreateDir {
                    name: event.name.clone(),
                }
            } else {
                ReplayAction::WriteFile {
                    name: event.name.clone(),
                    sha1: event.sha1,
                }
            };
            self.events.push(event);
            return Ok(action);
        }

        if event.file_id != self.file_id {
            anyhow::bail!(
                "Merge of event for {} into history {}",
                event.file_id,
                self.file_id
            );
        }
        if event.is_directory != self.is_directory() {
            anyhow::bail!(
                "Merge of {} event into history {}: is_directory disagrees",
                if event.is_directory { "directory" } else { "file" },
                self.file_id
            );
        }

        let last = self.require_head("Merge")?;
        let becomes_head = event.when > last.when;
        let is_directory = event.is_directory;
        let action = if !becomes_head {
            ReplayAction::None
        } else {
            match event.kind {
                EventKind::Created => {
                    if is_directory {
                        ReplayAction::CreateDir {
                            name: event.name.clone(),
                        }
                    } else {
                        ReplayAction::WriteFile {
                            name: event.name.clone(),
                            sha1: event.sha1,
                        }
                    }
                }
                EventKind::Changed => {
                    if is_directory {
                        ReplayAction::None
                    } else {
                        ReplayAction::WriteFile {
                            name: event.name.clone(),
                            sha1: event.sha1,
                        }
                    }
                }
                EventKind::Renamed => ReplayAction::Move {
                    from: last.name.clone(),
                    to: event.name.clone(),
                },
                EventKind::Deleted => {
                    if is_directory {
                        ReplayAction::RemoveDir {
                            name: event.name.clone(),
                        }
                    } else {
                        ReplayAction::RemoveFile {
                            name: event.name.clone(),
                        }
                    }
                }
            }
        };

        self.append_sorted(event);
        Ok(action)
    }

    fn require_head(&self, op: &str) -> Result<FileEvent> {
        self.current()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{} on empty history {}", op, self.file_id))
    }

    /// Insert and re-sort by `when`. The sort is stable, so events with
    /// equal timestamps keep their insertion order.
    fn append_sorted(&mut self, event: FileEvent) {
        self.events.push(event);
        self.events.sort_by_key(|e| e.when);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distribox_core::hash;

    fn file_history() -> FileHistory {
        let mut h = FileHistory::new(FileId::new());
        h.create("a.txt", false, 100).unwrap();
        h
    }

    #[test]
    fn test_create_is_first_and_empty() {
        let h = file_history();

        assert_eq!(h.len(), 1);
        let first = &h.events()[0];
        assert_eq!(first.kind, EventKind::Created);
        assert_eq!(first.sha1, None);
        assert_eq!(first.size, 0);
        assert_eq!(first.parent_event_id, None);
        assert!(h.is_alive());
        assert_eq!(h.current_name(), Some("a.txt"));
    }

    #[test]
    fn test_create_twice_fails() {
        let mut h = file_history();
        assert!(h.create("b.txt", false, 200).is_err());
    }

    #[test]
    fn test_change_copies_name_and_kind() {
        let mut h = file_history();
        let digest = hash::hash_bytes(b"hello");
        h.change(Some(digest), 5, 200).unwrap();

        let head = h.current().unwrap();
        assert_eq!(head.kind, EventKind::Changed);
        assert_eq!(head.name, "a.txt");
        assert_eq!(head.sha1, Some(digest));
        assert_eq!(head.size, 5);
        assert!(!head.is_directory);
    }

    #[test]
    fn test_change_null_sha1_zeroes_size() {
        let mut h = file_history();
        h.change(None, 999, 200).unwrap();
        assert_eq!(h.current_size(), 0);
    }

    #[test]
    fn test_rename_carries_content() {
        let mut h = file_history();
        let digest = hash::hash_bytes(b"hello");
        h.change(Some(digest), 5, 200).unwrap();
        h.rename("b.txt", 300).unwrap();

        let head = h.current().unwrap();
        assert_eq!(head.kind, EventKind::Renamed);
        assert_eq!(head.name, "b.txt");
        assert_eq!(head.sha1, Some(digest));
        assert_eq!(head.size, 5);
    }

    #[test]
    fn test_delete_tombstone() {
        let mut h = file_history();
        let digest = hash::hash_bytes(b"hello");
        h.change(Some(digest), 5, 200).unwrap();
        h.delete(300).unwrap();

        assert!(!h.is_alive());
        let head = h.current().unwrap();
        assert_eq!(head.kind, EventKind::Deleted);
        assert_eq!(head.name, "a.txt");
        assert_eq!(head.sha1, Some(digest));
    }

    #[test]
    fn test_is_directory_uniform() {
        let mut h = FileHistory::new(FileId::new());
        h.create("docs", true, 100).unwrap();
        h.rename("documents", 200).unwrap();
        h.delete(300).unwrap();

        assert!(h.events().iter().all(|e| e.is_directory));
        assert!(h.events().iter().all(|e| e.sha1.is_none()));
    }

    #[test]
    fn test_parent_chain() {
        let mut h = file_history();
        h.change(Some(hash::hash_bytes(b"x")), 1, 200).unwrap();
        h.rename("b.txt", 300).unwrap();
        h.delete(400).unwrap();

        let events = h.events();
        assert_eq!(events[0].parent_event_id, None);
        for pair in events.windows(2) {
            assert_eq!(pair[1].parent_event_id, Some(pair[0].event_id));
        }
    }

    #[test]
    fn test_ops_on_empty_history_fail() {
        let mut h = FileHistory::new(FileId::new());
        assert!(h.change(None, 0, 100).is_err());
        assert!(h.rename("x", 100).is_err());
        assert!(h.delete(100).is_err());
    }

    // Merge tests

    fn foreign_created(file_id: FileId, name: &str, when: u64) -> FileEvent {
        FileEvent::new(file_id, None, false, name.to_string(), when, None, 0, EventKind::Created)
    }

    #[test]
    fn test_merge_into_empty_requires_created() {
        let mut h = FileHistory::new(FileId::new());
        let event = FileEvent::new(
            FileId::new(),
            None,
            false,
            "a.txt".to_string(),
            100,
            None,
            0,
            EventKind::Changed,
        );
        assert!(h.merge(event).is_err());
    }

    #[test]
    fn test_merge_into_empty_adopts_identity() {
        let foreign_id = FileId::new();
        let mut h = FileHistory::new(FileId::new());
        let action = h.merge(foreign_created(foreign_id, "a.txt", 100)).unwrap();

        assert_eq!(h.file_id(), foreign_id);
        assert_eq!(
            action,
            ReplayAction::WriteFile {
                name: "a.txt".to_string(),
                sha1: None
            }
        );
    }

    #[test]
    fn test_merge_directory_create_replays_mkdir() {
        let id = FileId::new();
        let mut h = FileHistory::new(id);
        let event =
            FileEvent::new(id, None, true, "docs".to_string(), 100, None, 0, EventKind::Created);
        let action = h.merge(event).unwrap();
        assert_eq!(action, ReplayAction::CreateDir { name: "docs".to_string() });
    }

    #[test]
    fn test_merge_new_head_replays() {
        let mut h = file_history();
        let digest = hash::hash_bytes(b"hello");
        let event = FileEvent::new(
            h.file_id(),
            h.current().map(|e| e.event_id),
            false,
            "a.txt".to_string(),
            500,
            Some(digest),
            5,
            EventKind::Changed,
        );
        let action = h.merge(event).unwrap();
        assert_eq!(
            action,
            ReplayAction::WriteFile {
                name: "a.txt".to_string(),
                sha1: Some(digest)
            }
        );
    }

    #[test]
    fn test_merge_historical_event_replays_nothing() {
        let mut h = file_history();
        h.change(Some(hash::hash_bytes(b"new")), 3, 500).unwrap();

        // A foreign event older than the local head: recorded, not replayed
        let event = FileEvent::new(
            h.file_id(),
            None,
            false,
            "a.txt".to_string(),
            200,
            Some(hash::hash_bytes(b"old")),
            3,
            EventKind::Changed,
        );
        let action = h.merge(event).unwrap();

        assert_eq!(action, ReplayAction::None);
        assert_eq!(h.len(), 3);
        // Sorted into place, not at the tail
        assert_eq!(h.events()[1].when, 200);
        assert_eq!(h.current().unwrap().when, 500);
    }

    #[test]
    fn test_merge_rename_moves_from_previous_head() {
        let mut h = file_history();
        let event = FileEvent::new(
            h.file_id(),
            h.current().map(|e| e.event_id),
            false,
            "b.txt".to_string(),
            500,
            None,
            0,
            EventKind::Renamed,
        );
        let action = h.merge(event).unwrap();
        assert_eq!(
            action,
            ReplayAction::Move {
                from: "a.txt".to_string(),
                to: "b.txt".to_string()
            }
        );
    }

    #[test]
    fn test_merge_delete_replays_remove() {
        let mut h = file_history();
        let event = FileEvent::new(
            h.file_id(),
            None,
            false,
            "a.txt".to_string(),
            500,
            None,
            0,
            EventKind::Deleted,
        );
        let action = h.merge(event).unwrap();
        assert_eq!(action, ReplayAction::RemoveFile { name: "a.txt".to_string() });
        assert!(!h.is_alive());
    }

    #[test]
    fn test_merge_duplicate_event_is_noop() {
        let id = FileId::new();
        let mut h = FileHistory::new(id);
        let event = foreign_created(id, "a.txt", 100);

        let first = h.merge(event.clone()).unwrap();
        assert_ne!(first, ReplayAction::None);

        let second = h.merge(event).unwrap();
        assert_eq!(second, ReplayAction::None);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_merge_is_directory_mismatch_fails() {
        let mut h = file_history();
        let event = FileEvent::new(
            h.file_id(),
            None,
            true,
            "a.txt".to_string(),
            500,
            None,
            0,
            EventKind::Changed,
        );
        assert!(h.merge(event).is_err());
    }

    #[test]
    fn test_merge_wrong_file_id_fails() {
        let mut h = file_history();
        let event = foreign_created(FileId::new(), "other.txt", 500);
        assert!(h.merge(event).is_err());
    }

    #[test]
    fn test_sorted_after_out_of_order_merges() {
        let mut h = file_history();
        for when in [900, 300, 600] {
            let event = FileEvent::new(
                h.file_id(),
                None,
                false,
                "a.txt".to_string(),
                when,
                None,
                0,
                EventKind::Changed,
            );
            h.merge(event).unwrap();
        }

        let whens: Vec<_> = h.events().iter().map(|e| e.when).collect();
        assert_eq!(whens, vec![100, 300, 600, 900]);
    }

    #[test]
    fn test_equal_when_keeps_insertion_order() {
        let mut h = file_history();
        h.rename("b.txt", 200).unwrap();
        h.change(None, 0, 200).unwrap();

        let events = h.events();
        assert_eq!(events[1].kind, EventKind::Renamed);
        assert_eq!(events[2].kind, EventKind::Changed);
        // The change copied its name from the rename, which was head at
        // append time
        assert_eq!(events[2].name, "b.txt");
    }
}

//! File system watching and change detection for Distribox
//!
//! This crate provides the pipeline from raw OS notifications to the
//! canonical event stream:
//! - A mutex-protected raw-event queue fed by the OS watcher thread
//! - The process-global mute flag that suppresses merge feedback
//! - The change detector: serialized draining, monotonic timestamps,
//!   content hashing into the blob pool

pub mod detector;
pub mod mute;
pub mod watch;

pub use detector::{ChangeDetector, ChangeKind, DetectorEvent, FileNotice};
pub use mute::{MuteFlag, MuteGuard};
pub use watch::TreeWatcher;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// Result type for watcher operations
pub type Result<T> = anyhow::Result<T>;

/// Kind of raw notification, before canonicalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Created,
    Changed,
    Renamed,
    Deleted,
}

/// One raw notification from the OS watcher
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub kind: RawEventKind,
    /// Absolute path the event refers to (the destination, for renames)
    pub path: PathBuf,
    /// Absolute source path, renames only
    pub old_path: Option<PathBuf>,
}

/// Shared FIFO between the watcher thread and the detector worker
///
/// The watcher thread only enqueues under the lock; the worker pops one
/// event at a time. Cloning shares the underlying queue.
#[derive(Clone, Default)]
pub struct RawQueue {
    inner: Arc<Mutex<VecDeque<RawEvent>>>,
}

impl RawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: RawEvent) {
        self.inner.lock().push_back(event);
    }

    pub fn pop(&self) -> Option<RawEvent> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_fifo() {
        let queue = RawQueue::new();
        for name in ["a", "b", "c"] {
            queue.push(RawEvent {
                kind: RawEventKind::Created,
                path: PathBuf::from(name),
                old_path: None,
            });
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().path, PathBuf::from("a"));
        assert_eq!(queue.pop().unwrap().path, PathBuf::from("b"));
        assert_eq!(queue.pop().unwrap().path, PathBuf::from("c"));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_queue_clones_share_state() {
        let queue = RawQueue::new();
        let handle = queue.clone();

        handle.push(RawEvent {
            kind: RawEventKind::Deleted,
            path: PathBuf::from("x"),
            old_path: None,
        });
        assert_eq!(queue.len(), 1);
    }
}

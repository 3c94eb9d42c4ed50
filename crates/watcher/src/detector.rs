//! The change detector: raw notifications in, canonical events out
//!
//! A single worker drains the raw queue one event at a time, stamps each
//! with a strictly monotonic tick, resolves file kind by stat, hashes
//! changed content into the blob pool, and publishes typed notices plus
//! an Idle signal to subscribers. Transient I/O failures drop the event
//! with a warning; the next cycle re-observes the file.

use crate::{RawEvent, RawEventKind, RawQueue, Result};
use distribox_core::{hash, BlobPool, Config, Sha1Hash, TickClock, Ticks};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Canonical change type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Changed,
    Renamed,
    Deleted,
}

/// One canonical file notification
#[derive(Debug, Clone)]
pub struct FileNotice {
    pub kind: ChangeKind,
    /// Current name, relative to the sync root
    pub name: String,
    /// Previous name, renames only
    pub old_name: Option<String>,
    pub is_directory: bool,
    /// Digest of the content now on disk; set for non-directory
    /// Changed/Renamed, after the bytes are in the blob pool
    pub sha1: Option<Sha1Hash>,
    pub when: Ticks,
}

/// What subscribers receive
#[derive(Debug, Clone)]
pub enum DetectorEvent {
    File(FileNotice),
    /// The queue ran dry: flushing and bundle generation are safe
    Idle,
}

/// Serialized translator from raw filesystem notifications to the
/// canonical event stream
pub struct ChangeDetector {
    root: PathBuf,
    config: Config,
    queue: RawQueue,
    clock: TickClock,
    pool: Arc<BlobPool>,
    subscribers: Vec<mpsc::UnboundedSender<DetectorEvent>>,
}

impl ChangeDetector {
    /// Create a detector over `queue`
    ///
    /// `last_when` seeds the clock — pass the version list's greatest
    /// timestamp so stamps stay strictly increasing across restarts.
    pub fn new(
        root: PathBuf,
        config: Config,
        queue: RawQueue,
        pool: Arc<BlobPool>,
        last_when: Ticks,
    ) -> Self {
        Self {
            root,
            config,
            queue,
            clock: TickClock::seeded(last_when),
            pool,
            subscribers: Vec::new(),
        }
    }

    /// Register a subscriber for canonical events
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DetectorEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Raw events waiting to be processed
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue, one raw event at a time
    ///
    /// Returns the notices produced this cycle, in order; each was also
    /// published to subscribers. Call [`Self::emit_idle`] once the
    /// cycle's consequences (version list mutations, flush) are done.
    pub fn drain(&mut self) -> Vec<FileNotice> {
        let mut notices = Vec::new();
        while let Some(raw) = self.queue.pop() {
            match self.process_raw(raw) {
                Ok(Some(notice)) => {
                    self.publish(DetectorEvent::File(notice.clone()));
                    notices.push(notice);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Dropped raw event: {:#}", e),
            }
        }
        notices
    }

    /// Publish the idle boundary to subscribers
    pub fn emit_idle(&mut self) {
        self.publish(DetectorEvent::Idle);
    }

    /// Canonicalize one raw event
    ///
    /// Timestamps first (monotonicity is about dequeue order, not about
    /// how long hashing takes), then resolves kind and content.
    fn process_raw(&mut self, raw: RawEvent) -> Result<Option<FileNotice>> {
        let when = self.clock.next();
        let name = self.config.normalize_name(&self.root, &raw.path)?;
        if name.is_empty() {
            // The root itself; nothing to track
            return Ok(None);
        }

        let notice = match raw.kind {
            RawEventKind::Created => {
                let is_directory = std::fs::metadata(&raw.path)?.is_dir();
                FileNotice {
                    kind: ChangeKind::Created,
                    name,
                    old_name: None,
                    is_directory,
                    sha1: None,
                    when,
                }
            }
            RawEventKind::Changed => {
                let is_directory = std::fs::metadata(&raw.path)?.is_dir();
                let sha1 = if is_directory {
                    None
                } else {
                    Some(self.hash_into_pool(&raw.path)?)
                };
                FileNotice {
                    kind: ChangeKind::Changed,
                    name,
                    old_name: None,
                    is_directory,
                    sha1,
                    when,
                }
            }
            RawEventKind::Renamed => {
                let old_path = raw
                    .old_path
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("Renamed raw event without old path"))?;
                let old_name = self.config.normalize_name(&self.root, old_path)?;
                let is_directory = std::fs::metadata(&raw.path)?.is_dir();
                // Some platforms report content edits as renames; hash so
                // the version list can tell
                let sha1 = if is_directory {
                    None
                } else {
                    Some(self.hash_into_pool(&raw.path)?)
                };
                FileNotice {
                    kind: ChangeKind::Renamed,
                    name,
                    old_name: Some(old_name),
                    is_directory,
                    sha1,
                    when,
                }
            }
            RawEventKind::Deleted => FileNotice {
                kind: ChangeKind::Deleted,
                name,
                old_name: None,
                // The path is gone; the history knows what it was
                is_directory: false,
                sha1: None,
                when,
            },
        };

        Ok(Some(notice))
    }

    /// Hash a file's current content and make sure the pool holds it
    fn hash_into_pool(&self, path: &Path) -> Result<Sha1Hash> {
        let digest = hash::hash_file_stable(path, 3)?;
        if !self.pool.exists(digest) {
            let stored = self.pool.put_path(path)?;
            if stored != digest {
                // The file changed between the stable read and the copy;
                // the pool holds what is on disk now, log that instead
                tracing::debug!(
                    "Content of {} moved during ingest: {} -> {}",
                    path.display(),
                    digest,
                    stored
                );
                return Ok(stored);
            }
        }
        Ok(digest)
    }

    fn publish(&mut self, event: DetectorEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

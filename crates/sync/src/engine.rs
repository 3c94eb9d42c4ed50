//! One peer's assembled pipeline
//!
//! The engine owns the store, blob pool, detector, and controller, and
//! serializes everything that mutates the version list or the working
//! tree: ticks (detector drain + apply + flush) and bundle Accepts both
//! go through `&mut self`, so wrapping the engine in a mutex gives the
//! daemon the one-lock model the concurrency design asks for.

use crate::{bundle, controller::VersionController};
use anyhow::Result;
use distribox_core::{BlobPool, Store};
use distribox_version::VersionList;
use distribox_watcher::{ChangeDetector, DetectorEvent, MuteFlag, RawQueue, TreeWatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A peer: working tree, metadata, and the detector/controller pair
pub struct Engine {
    store: Store,
    pool: Arc<BlobPool>,
    queue: RawQueue,
    mute: MuteFlag,
    detector: ChangeDetector,
    controller: VersionController,
    watcher: Option<TreeWatcher>,
}

impl Engine {
    /// Open an initialized sync root
    pub fn open(root: &Path) -> Result<Self> {
        let store = Store::open(root)?;
        let pool = Arc::new(store.blob_pool());
        let controller = VersionController::open(&store, Arc::clone(&pool))?;

        let queue = RawQueue::new();
        let mute = MuteFlag::new();
        let detector = ChangeDetector::new(
            store.root().to_path_buf(),
            store.config().clone(),
            queue.clone(),
            Arc::clone(&pool),
            controller.list().latest_when(),
        );

        Ok(Self {
            store,
            pool,
            queue,
            mute,
            detector,
            controller,
            watcher: None,
        })
    }

    /// Start the OS watcher feeding this engine's raw queue
    pub fn start_watching(&mut self) -> Result<()> {
        if self.watcher.is_none() {
            self.watcher = Some(TreeWatcher::start(
                self.store.root(),
                &self.store.config().meta_dir,
                self.queue.clone(),
                self.mute.clone(),
            )?);
        }
        Ok(())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn list(&self) -> &VersionList {
        self.controller.list()
    }

    /// Raw-event handle, for tests that drive the pipeline by hand
    pub fn raw_queue(&self) -> RawQueue {
        self.queue.clone()
    }

    /// Subscribe to canonical detector events (plus Idle)
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DetectorEvent> {
        self.detector.subscribe()
    }

    /// Raw events waiting for the next tick
    pub fn pending(&self) -> usize {
        self.detector.pending()
    }

    /// One worker cycle: drain, apply, flush if anything happened, then
    /// signal the idle boundary. Returns whether any event was processed.
    pub fn tick(&mut self) -> Result<bool> {
        let notices = self.detector.drain();
        let had_events = !notices.is_empty();

        for notice in &notices {
            if let Err(e) = self.controller.apply(notice) {
                // Detector-side errors never escalate; the next cycle
                // re-observes the tree
                tracing::warn!("Dropped event for {}: {:#}", notice.name, e);
            }
        }

        if had_events {
            self.controller.flush()?;
        }
        self.detector.emit_idle();
        Ok(had_events)
    }

    /// Package this peer's entire version list into a bundle archive
    pub fn build_bundle(&self) -> Result<PathBuf> {
        let histories: Vec<_> = self.controller.list().iter().cloned().collect();
        bundle::build(&histories, &self.pool, &self.store.tmp_dir())
    }

    /// Accept received bundle bytes
    ///
    /// On success the merged list is flushed. On failure the in-memory
    /// list is reloaded from disk, so a half-merged state never lingers.
    pub fn accept(&mut self, bytes: &[u8]) -> Result<()> {
        // OS notifications for replay writes arrive asynchronously; the
        // stage cleanup and flush after the last replay syscall run with
        // the flag still held, which covers the delivery lag
        let _guard = self.mute.mute();
        let result = bundle::accept(
            bytes,
            self.controller.list_mut(),
            &self.pool,
            self.store.root(),
            self.store.config(),
            &self.mute,
            &self.store.tmp_dir(),
        );

        match result {
            Ok(()) => self.controller.flush(),
            Err(e) => {
                self.controller.reload()?;
                Err(e)
            }
        }
    }
}

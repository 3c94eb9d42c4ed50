//! Bridge from the OS watcher to the raw-event queue
//!
//! The notify callback runs on the watcher's own thread. It does nothing
//! except convert, filter and enqueue under the queue lock; everything
//! heavier happens in the detector worker.

use crate::mute::MuteFlag;
use crate::{RawEvent, RawEventKind, RawQueue, Result};
use anyhow::Context;
use notify::event::{Event, EventKind as NotifyKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Component, Path, PathBuf};

/// Recursive watcher over the sync root
///
/// Keeps the underlying notify watcher alive; dropping this stops the
/// raw event flow.
pub struct TreeWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl TreeWatcher {
    /// Start watching `root`, enqueuing onto `queue`
    ///
    /// Events under the metadata directory are filtered out, and nothing
    /// is enqueued while `mute` is set.
    pub fn start(root: &Path, meta_dir: &str, queue: RawQueue, mute: MuteFlag) -> Result<Self> {
        let root_buf = root.to_path_buf();
        let meta_dir = meta_dir.to_string();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if mute.is_muted() {
                        return;
                    }
                    for raw in convert(&root_buf, &meta_dir, event) {
                        queue.push(raw);
                    }
                }
                Err(e) => tracing::warn!("Watcher error: {}", e),
            }
        })
        .context("Failed to create filesystem watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        Ok(Self {
            _watcher: watcher,
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Map one notify event onto zero or more raw events
///
/// Rename reporting differs per platform: a single event carrying both
/// paths becomes one Renamed; detached From/To halves degrade to
/// Deleted/Created, which the version list models just as well.
fn convert(root: &Path, meta_dir: &str, event: Event) -> Vec<RawEvent> {
    let mut raw = Vec::new();

    let kind = match event.kind {
        NotifyKind::Create(_) => RawEventKind::Created,
        NotifyKind::Remove(_) => RawEventKind::Deleted,
        NotifyKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both | RenameMode::Any if event.paths.len() == 2 => {
                let from = event.paths[0].clone();
                let to = event.paths[1].clone();
                if !(in_meta_dir(root, meta_dir, &from) || in_meta_dir(root, meta_dir, &to)) {
                    raw.push(RawEvent {
                        kind: RawEventKind::Renamed,
                        path: to,
                        old_path: Some(from),
                    });
                }
                return raw;
            }
            RenameMode::From => RawEventKind::Deleted,
            RenameMode::To => RawEventKind::Created,
            _ => RawEventKind::Changed,
        },
        NotifyKind::Modify(_) => RawEventKind::Changed,
        // Access and catch-all notifications carry no tree change
        _ => return raw,
    };

    for path in event.paths {
        if in_meta_dir(root, meta_dir, &path) {
            continue;
        }
        raw.push(RawEvent {
            kind,
            path,
            old_path: None,
        });
    }
    raw
}

/// True when `path` is the metadata directory or anything below it
fn in_meta_dir(root: &Path, meta_dir: &str, path: &Path) -> bool {
    let relative = match path.strip_prefix(root) {
        Ok(r) => r,
        Err(_) => return false,
    };
    matches!(
        relative.components().next(),
        Some(Component::Normal(first)) if first == meta_dir
    )
}

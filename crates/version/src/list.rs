//! The version list: every history on this peer, two ways
//!
//! Primary view: `FileId` → history. Secondary view: current name →
//! history, for alive histories only. The secondary index is rebuilt on
//! load and maintained on every mutation; it is never persisted.

use crate::event::FileId;
use crate::history::FileHistory;
use ahash::AHashMap;
use anyhow::{Context, Result};
use distribox_core::{Sha1Hash, Ticks};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All histories on one peer
#[derive(Debug, Default)]
pub struct VersionList {
    histories: AHashMap<FileId, FileHistory>,
    by_name: AHashMap<String, FileId>,
}

/// On-disk form: just the histories; the name index is derived
#[derive(Serialize, Deserialize)]
struct Document {
    histories: Vec<FileHistory>,
}

impl VersionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileHistory> {
        self.histories.values()
    }

    /// Look up a history by identity
    pub fn get(&self, file_id: FileId) -> Option<&FileHistory> {
        self.histories.get(&file_id)
    }

    /// Look up the unique alive history currently at `name`
    pub fn by_name(&self, name: &str) -> Option<&FileHistory> {
        self.by_name.get(name).and_then(|id| self.histories.get(id))
    }

    /// Greatest timestamp across every event on record; seeds the tick
    /// clock so local stamps stay strictly increasing across restarts
    pub fn latest_when(&self) -> Ticks {
        self.histories
            .values()
            .flat_map(|h| h.events())
            .map(|e| e.when)
            .max()
            .unwrap_or(0)
    }

    /// A file (or directory) came into being: allocate an identity,
    /// start its history, index its name
    pub fn create(&mut self, name: &str, is_directory: bool, when: Ticks) -> Result<FileId> {
        let file_id = FileId::new();
        let mut history = FileHistory::new(file_id);
        history.create(name, is_directory, when)?;

        if let Some(shadowed) = self.by_name.get(name) {
            // Possible only when two alive identities collide on a path;
            // the filesystem already let the later one win
            tracing::warn!("Name {} re-created while {} is still alive", name, shadowed);
        }

        self.histories.insert(file_id, history);
        self.by_name.insert(name.to_string(), file_id);
        Ok(file_id)
    }

    /// Content changed under an existing name
    pub fn change(
        &mut self,
        name: &str,
        is_directory: bool,
        sha1: Option<Sha1Hash>,
        size: u64,
        when: Ticks,
    ) -> Result<()> {
        let history = self.alive_mut(name)?;
        if history.is_directory() != is_directory {
            anyhow::bail!(
                "Change at {} disagrees on is_directory with its history",
                name
            );
        }
        history.change(sha1, size, when)
    }

    /// A file moved from `old_name` to `new_name`
    ///
    /// The index entry moves under the same mutation. Some platforms
    /// report content edits as renames, so a differing non-null digest
    /// additionally appends a Changed event.
    pub fn rename(
        &mut self,
        new_name: &str,
        old_name: &str,
        sha1: Option<Sha1Hash>,
        size: u64,
        when: Ticks,
    ) -> Result<()> {
        let id = *self
            .by_name
            .get(old_name)
            .with_context(|| format!("No alive history at {}", old_name))?;
        let history = self
            .histories
            .get_mut(&id)
            .with_context(|| format!("Name index points at missing history {}", id))?;

        history.rename(new_name, when)?;
        if let Some(digest) = sha1 {
            if history.current_sha1() != Some(digest) {
                history.change(Some(digest), size, when)?;
            }
        }

        self.by_name.remove(old_name);
        self.by_name.insert(new_name.to_string(), id);
        Ok(())
    }

    /// A file disappeared: tombstone its history, drop it from the index
    pub fn delete(&mut self, name: &str, when: Ticks) -> Result<()> {
        let history = self.alive_mut(name)?;
        history.delete(when)?;
        self.by_name.remove(name);
        Ok(())
    }

    /// History for `file_id`, created empty if this peer has never seen
    /// the identity (merge registration)
    pub fn ensure_history(&mut self, file_id: FileId) -> &mut FileHistory {
        self.histories
            .entry(file_id)
            .or_insert_with(|| FileHistory::new(file_id))
    }

    /// Rebuild the name index from scratch
    ///
    /// Alive histories are indexed in head-timestamp order, so when two
    /// of them claim one name the later writer holds the slot — the same
    /// outcome the filesystem enforced on the working tree.
    pub fn reindex(&mut self) {
        let mut alive: Vec<(Ticks, FileId, String)> = self
            .histories
            .values()
            .filter(|h| h.is_alive())
            .filter_map(|h| {
                let head = h.current()?;
                Some((head.when, h.file_id(), head.name.clone()))
            })
            .collect();
        alive.sort_by(|a, b| a.0.cmp(&b.0));

        self.by_name.clear();
        for (_, id, name) in alive {
            self.by_name.insert(name, id);
        }
    }

    /// Read the serialized list and rebuild the name index
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read version list: {}", path.display()))?;
        let document: Document = serde_json::from_str(&text)
            .with_context(|| format!("Invalid version list: {}", path.display()))?;

        let mut list = Self::new();
        for history in document.histories {
            list.histories.insert(history.file_id(), history);
        }
        list.reindex();
        Ok(list)
    }

    /// Load if the file exists, else start empty
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write the serialized list atomically (temp + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut histories: Vec<FileHistory> = self.histories.values().cloned().collect();
        histories.sort_by_key(|h| h.file_id());

        let document = Document { histories };
        let text = serde_json::to_string_pretty(&document)?;

        let parent = path
            .parent()
            .with_context(|| format!("Version list path has no parent: {}", path.display()))?;
        let temp_path = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        std::fs::write(&temp_path, text)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Count of alive histories
    pub fn alive_count(&self) -> usize {
        self.histories.values().filter(|h| h.is_alive()).count()
    }

    fn alive_mut(&mut self, name: &str) -> Result<&mut FileHistory> {
        let id = *self
            .by_name
            .get(name)
            .with_context(|| format!("No alive history at {}", name))?;
        self.histories
            .get_mut(&id)
            .with_context(|| format!("Name index points at missing history {}", id))
    }
}

/// Structural equality of two lists: same identities, same event logs.
/// Test-facing; the sync suite uses it for the round-trip properties.
pub fn lists_equal(a: &VersionList, b: &VersionList) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|ha| {
        b.get(ha.file_id()).is_some_and(|hb| {
            ha.len() == hb.len()
                && ha.events().iter().zip(hb.events()).all(|(ea, eb)| {
                    ea.event_id == eb.event_id
                        && ea.parent_event_id == eb.parent_event_id
                        && ea.kind == eb.kind
                        && ea.name == eb.name
                        && ea.when == eb.when
                        && ea.sha1 == eb.sha1
                        && ea.size == eb.size
                        && ea.is_directory == eb.is_directory
                })
        })
    })
}

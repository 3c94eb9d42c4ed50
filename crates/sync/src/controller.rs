//! Version controller: detector events onto the version list

use anyhow::{Context, Result};
use distribox_core::{BlobPool, Store};
use distribox_version::VersionList;
use distribox_watcher::{ChangeKind, FileNotice};
use std::path::PathBuf;
use std::sync::Arc;

/// Thin façade between the detector and the version list
///
/// Each canonical notice becomes exactly one version list operation;
/// `flush` persists the list and is the quiescence point the idle
/// signal drives.
pub struct VersionController {
    list: VersionList,
    list_path: PathBuf,
    pool: Arc<BlobPool>,
}

impl VersionController {
    /// Load the persisted list (or start empty) for a store
    pub fn open(store: &Store, pool: Arc<BlobPool>) -> Result<Self> {
        let list_path = store.version_list_path();
        let list = VersionList::load_or_default(&list_path)?;
        Ok(Self {
            list,
            list_path,
            pool,
        })
    }

    pub fn list(&self) -> &VersionList {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut VersionList {
        &mut self.list
    }

    /// Apply one canonical detector notice
    pub fn apply(&mut self, notice: &FileNotice) -> Result<()> {
        match notice.kind {
            ChangeKind::Created => {
                self.list
                    .create(&notice.name, notice.is_directory, notice.when)?;
            }
            ChangeKind::Changed => {
                let size = self.blob_size(notice)?;
                self.list.change(
                    &notice.name,
                    notice.is_directory,
                    notice.sha1,
                    size,
                    notice.when,
                )?;
            }
            ChangeKind::Renamed => {
                let old_name = notice
                    .old_name
                    .as_deref()
                    .context("Renamed notice without old name")?;
                let size = self.blob_size(notice)?;
                self.list
                    .rename(&notice.name, old_name, notice.sha1, size, notice.when)?;
            }
            ChangeKind::Deleted => {
                self.list.delete(&notice.name, notice.when)?;
            }
        }
        tracing::debug!("{:?} {}", notice.kind, notice.name);
        Ok(())
    }

    /// Write the version list to disk atomically
    pub fn flush(&self) -> Result<()> {
        self.list.save(&self.list_path)
    }

    /// Throw away in-memory state and reload what is on disk
    ///
    /// Used after a failed Accept: the merge may have touched histories
    /// before erroring, and the on-disk list is the last good state.
    pub fn reload(&mut self) -> Result<()> {
        self.list = VersionList::load_or_default(&self.list_path)?;
        Ok(())
    }

    fn blob_size(&self, notice: &FileNotice) -> Result<u64> {
        match notice.sha1 {
            Some(digest) => self
                .pool
                .size_of(digest)
                .with_context(|| format!("Notice for {} references a missing blob", notice.name)),
            None => Ok(0),
        }
    }
}

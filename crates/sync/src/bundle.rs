//! Delta bundles: histories plus their referenced blobs, zipped
//!
//! A bundle is a single deflate archive holding `Delta.txt` (the JSON
//! list of file histories being transferred) and one entry per distinct
//! referenced blob, named by its digest. Build stages into a fresh
//! random-named directory under the scratch dir; Accept extracts into
//! one, verifies every blob against its filename digest, then merges
//! event by event, replaying onto the working tree with the detector
//! muted.

use crate::replay;
use anyhow::{Context, Result};
use distribox_core::{hash, BlobPool, Config, Sha1Hash};
use distribox_version::{FileHistory, VersionList};
use distribox_watcher::MuteFlag;
use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

/// Archive entry holding the serialized histories
pub const DELTA_FILE: &str = "Delta.txt";

/// Package histories and their blobs into an archive under `tmp_dir`
///
/// Every blob referenced by any event is included, whether or not the
/// receiver already holds it; Accept skips duplicates cheaply.
pub fn build(histories: &[FileHistory], pool: &BlobPool, tmp_dir: &Path) -> Result<PathBuf> {
    let stage_name = uuid::Uuid::new_v4().simple().to_string();
    let stage = tmp_dir.join(&stage_name);
    fs::create_dir_all(&stage)
        .with_context(|| format!("Failed to create bundle stage: {}", stage.display()))?;

    let result = build_in_stage(histories, pool, tmp_dir, &stage, &stage_name);
    let _ = fs::remove_dir_all(&stage);
    result
}

fn build_in_stage(
    histories: &[FileHistory],
    pool: &BlobPool,
    tmp_dir: &Path,
    stage: &Path,
    stage_name: &str,
) -> Result<PathBuf> {
    let delta = serde_json::to_vec_pretty(histories)?;
    fs::write(stage.join(DELTA_FILE), delta)?;

    let mut copied: HashSet<Sha1Hash> = HashSet::new();
    for history in histories {
        for event in history.events() {
            if let Some(digest) = event.sha1 {
                if copied.insert(digest) {
                    pool.copy_to(digest, &stage.join(digest.to_hex()))
                        .with_context(|| {
                            format!("History {} references {}", history.file_id(), digest)
                        })?;
                }
            }
        }
    }

    let archive_path = tmp_dir.join(format!("{}.zip", stage_name));
    zip_flat_dir(stage, &archive_path)?;

    tracing::info!(
        "Built bundle: {} histories, {} blobs",
        histories.len(),
        copied.len()
    );
    Ok(archive_path)
}

/// Accept a received bundle: ingest blobs, merge histories, replay
///
/// Fails whole — a protocol or integrity error leaves the scratch area
/// clean and nothing flushed. The caller persists (or reloads) the list
/// depending on the outcome.
pub fn accept(
    bytes: &[u8],
    list: &mut VersionList,
    pool: &BlobPool,
    root: &Path,
    config: &Config,
    mute: &MuteFlag,
    tmp_dir: &Path,
) -> Result<()> {
    let stage = tmp_dir.join(uuid::Uuid::new_v4().simple().to_string());
    fs::create_dir_all(&stage)
        .with_context(|| format!("Failed to create accept stage: {}", stage.display()))?;

    let result = accept_in_stage(bytes, list, pool, root, config, mute, &stage);
    let _ = fs::remove_dir_all(&stage);
    result
}

fn accept_in_stage(
    bytes: &[u8],
    list: &mut VersionList,
    pool: &BlobPool,
    root: &Path,
    config: &Config,
    mute: &MuteFlag,
    stage: &Path,
) -> Result<()> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("Bundle is not a readable archive")?;

    let mut delta: Option<Vec<u8>> = None;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = sanitize_entry_name(entry.name())?;

        if name == DELTA_FILE {
            let mut buf = Vec::with_capacity(entry.size() as usize);
            std::io::copy(&mut entry, &mut buf)?;
            delta = Some(buf);
            continue;
        }

        // Everything else is a blob named by its digest
        let claimed = Sha1Hash::from_hex(&name)
            .with_context(|| format!("Bundle entry {} is neither delta nor digest", name))?;
        if pool.exists(claimed) {
            continue;
        }

        let extracted = stage.join(&name);
        let mut out = fs::File::create(&extracted)?;
        std::io::copy(&mut entry, &mut out)?;
        out.flush()?;
        drop(out);

        let actual = hash::hash_file(&extracted)?;
        if actual != claimed {
            anyhow::bail!(
                "Bundle blob {} hashes to {}: content does not match its name",
                claimed,
                actual
            );
        }
        pool.put_path(&extracted)?;
    }

    let delta = delta.context("Bundle has no Delta.txt")?;
    let foreign: Vec<FileHistory> =
        serde_json::from_slice(&delta).context("Delta.txt is not a valid history list")?;

    // Notifications for replay writes are delivered asynchronously, so
    // the flag stays held across the whole replay run on top of the
    // per-syscall guards inside `replay::apply`
    let _merge_guard = mute.mute();
    let mut merged = 0usize;
    for history in &foreign {
        let local = list.ensure_history(history.file_id());
        for event in history.events() {
            let action = local
                .merge(event.clone())
                .with_context(|| format!("Merging history {}", history.file_id()))?;
            replay::apply(&action, root, config, pool, mute)?;
            merged += 1;
        }
    }
    list.reindex();

    tracing::info!("Accepted bundle: {} histories, {} events", foreign.len(), merged);
    Ok(())
}

/// Archive a flat staging directory into `archive_path`
fn zip_flat_dir(stage: &Path, archive_path: &Path) -> Result<()> {
    let file = fs::File::create(archive_path)
        .with_context(|| format!("Failed to create {}", archive_path.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for entry in fs::read_dir(stage)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        writer.start_file(name, options)?;
        let mut source = fs::File::open(entry.path())?;
        std::io::copy(&mut source, &mut writer)?;
    }

    writer.finish()?;
    Ok(())
}

/// Bundle entries are flat file names; anything path-like is hostile
fn sanitize_entry_name(raw: &str) -> Result<String> {
    if raw.is_empty() || raw.contains('/') || raw.contains('\\') || raw.contains("..") {
        anyhow::bail!("Bundle contains invalid entry path: {:?}", raw);
    }
    Ok(raw.to_string())
}

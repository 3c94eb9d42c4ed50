//! Bundle command - package the whole version list

use crate::util;
use anyhow::{Context, Result};
use distribox_sync::Engine;
use std::fs;
use std::path::{Path, PathBuf};

/// Execute bundle: build an archive and move it to `out`
pub fn execute(root: Option<PathBuf>, out: &Path) -> Result<()> {
    let root = util::resolve_root(root)?;
    let engine = Engine::open(&root)?;

    let archive = engine.build_bundle()?;
    // The archive lands in the scratch dir; rename may cross devices
    fs::copy(&archive, out)
        .with_context(|| format!("Failed to write bundle to {}", out.display()))?;
    fs::remove_file(&archive)?;

    let size = fs::metadata(out)?.len();
    println!(
        "Bundled {} histories into {} ({} bytes)",
        engine.list().len(),
        out.display(),
        size
    );
    Ok(())
}

//! Accept command - merge a bundle archive from disk

use crate::util;
use anyhow::{Context, Result};
use distribox_sync::Engine;
use std::fs;
use std::path::{Path, PathBuf};

/// Execute accept
pub fn execute(root: Option<PathBuf>, file: &Path) -> Result<()> {
    let root = util::resolve_root(root)?;
    let mut engine = Engine::open(&root)?;

    let bytes =
        fs::read(file).with_context(|| format!("Failed to read bundle {}", file.display()))?;
    engine.accept(&bytes)?;

    println!(
        "Accepted {} ({} histories on record)",
        file.display(),
        engine.list().len()
    );
    Ok(())
}

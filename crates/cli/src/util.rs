//! Shared CLI helpers

use anyhow::{Context, Result};
use distribox_core::config::DEFAULT_META_DIR;
use std::path::PathBuf;

/// Resolve the sync root: an explicit `--root`, or the nearest ancestor
/// of the current directory containing a metadata directory
pub fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    find_sync_root()
}

/// Walk upward from the current directory looking for `.Distribox/`
pub fn find_sync_root() -> Result<PathBuf> {
    let start = std::env::current_dir().context("Cannot read current directory")?;
    let mut dir = start.as_path();

    loop {
        if dir.join(DEFAULT_META_DIR).is_dir() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => anyhow::bail!(
                "No sync root found from {} upward (run `distribox init` first)",
                start.display()
            ),
        }
    }
}

/// Render a tick timestamp as seconds since the epoch with tick precision
pub fn format_when(ticks: distribox_core::Ticks) -> String {
    let secs = ticks / distribox_core::clock::TICKS_PER_SECOND;
    let frac = ticks % distribox_core::clock::TICKS_PER_SECOND;
    format!("{}.{:07}", secs, frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_explicit_root_wins() -> Result<()> {
        let root = resolve_root(Some(PathBuf::from("/some/where")))?;
        assert_eq!(root, PathBuf::from("/some/where"));
        Ok(())
    }

    #[test]
    fn test_format_when() {
        assert_eq!(format_when(0), "0.0000000");
        assert_eq!(format_when(10_000_001), "1.0000001");
    }
}

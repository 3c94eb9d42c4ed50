//! Status command - version list summary

use crate::util;
use anyhow::Result;
use distribox_sync::Engine;
use std::path::PathBuf;

/// Execute status
pub fn execute(root: Option<PathBuf>) -> Result<()> {
    let root = util::resolve_root(root)?;
    let engine = Engine::open(&root)?;

    let list = engine.list();
    let alive = list.alive_count();
    let deleted = list.len() - alive;

    println!("Sync root:  {}", engine.store().root().display());
    println!("Histories:  {} ({} alive, {} deleted)", list.len(), alive, deleted);

    let mut names: Vec<&str> = list
        .iter()
        .filter(|h| h.is_alive())
        .filter_map(|h| h.current_name())
        .collect();
    names.sort_unstable();
    for name in names {
        println!("  {}", name);
    }
    Ok(())
}

//! Log command - one history's event log

use crate::util;
use anyhow::{Context, Result};
use distribox_sync::Engine;
use std::path::PathBuf;

/// Execute log for the history currently at `name`
pub fn execute(root: Option<PathBuf>, name: &str) -> Result<()> {
    let root = util::resolve_root(root)?;
    let engine = Engine::open(&root)?;

    let history = engine
        .list()
        .by_name(name)
        .with_context(|| format!("No alive history at {}", name))?;

    println!("History {} ({} events)", history.file_id(), history.len());
    for event in history.events() {
        let digest = event
            .sha1
            .map(|d| d.to_hex())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {:<8}  {:<30}  {:>8}  {}",
            util::format_when(event.when),
            format!("{:?}", event.kind),
            event.name,
            event.size,
            digest
        );
    }
    Ok(())
}

//! Init command - set up a sync root

use anyhow::{Context, Result};
use distribox_core::{Config, Store};
use std::path::PathBuf;

/// Execute init: create the metadata directory in the target root
pub fn execute(root: Option<PathBuf>) -> Result<()> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir().context("Cannot read current directory")?,
    };

    let store = Store::init(&root, Config::default())?;
    println!("Initialized sync root at {}", store.root().display());
    println!("Metadata in {}", store.meta_dir().display());
    Ok(())
}

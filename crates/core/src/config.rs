//! Configuration for a sync root

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default metadata directory name under the sync root
pub const DEFAULT_META_DIR: &str = ".Distribox";

/// Default detector polling interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Settings the core consumes; persisted as `config.toml` inside the
/// metadata directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Detector polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Metadata directory name (excluded from watching)
    pub meta_dir: String,
    /// Separator used in event names, regardless of platform
    pub path_separator: char,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            meta_dir: DEFAULT_META_DIR.to_string(),
            path_separator: '/',
        }
    }
}

impl Config {
    /// Load from a toml file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Write to a toml file
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Convert an absolute path under `root` into an event name: relative,
    /// joined by the configured separator
    pub fn normalize_name(&self, root: &Path, path: &Path) -> Result<String> {
        let relative = path
            .strip_prefix(root)
            .with_context(|| format!("Path {} is outside the sync root", path.display()))?;

        let mut name = String::new();
        for component in relative.components() {
            if !name.is_empty() {
                name.push(self.path_separator);
            }
            name.push_str(&component.as_os_str().to_string_lossy());
        }
        Ok(name)
    }

    /// Convert an event name back into an absolute path under `root`
    pub fn denormalize_name(&self, root: &Path, name: &str) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in name.split(self.path_separator) {
            path.push(part);
        }
        path
    }
}

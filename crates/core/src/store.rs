//! On-disk layout of the metadata directory
//!
//! Manages the structure under the sync root:
//! ```text
//! <root>/
//!   ... user files ...
//!   .Distribox/
//!     config.toml
//!     VersionList.txt      serialized version list
//!     data/                blob pool, one file per digest
//!     tmp/                 scratch for bundle build/accept and blob ingest
//! ```

use crate::blob::BlobPool;
use crate::config::Config;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Handle to an initialized sync root
pub struct Store {
    /// Root of the synced tree
    root: PathBuf,
    /// Path to the metadata directory
    meta_dir: PathBuf,
    /// Loaded configuration
    config: Config,
}

impl Store {
    /// Initialize a new store at the given sync root
    pub fn init(root: &Path, config: Config) -> Result<Self> {
        let meta_dir = root.join(&config.meta_dir);

        if meta_dir.exists() {
            anyhow::bail!("Store already initialized at {}", root.display());
        }

        fs::create_dir_all(&meta_dir)?;
        fs::create_dir_all(meta_dir.join("data"))?;
        fs::create_dir_all(meta_dir.join("tmp"))?;

        config.save(&meta_dir.join("config.toml"))?;

        tracing::info!("Initialized store at {}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
            meta_dir,
            config,
        })
    }

    /// Open an existing store
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with_meta_dir(root, crate::config::DEFAULT_META_DIR)
    }

    /// Open an existing store with a non-default metadata directory name
    pub fn open_with_meta_dir(root: &Path, meta_dir_name: &str) -> Result<Self> {
        let meta_dir = root.join(meta_dir_name);

        if !meta_dir.exists() {
            anyhow::bail!("Store not initialized at {}", root.display());
        }

        for dir in ["data", "tmp"] {
            let path = meta_dir.join(dir);
            if !path.exists() {
                anyhow::bail!("Missing required directory: {}", dir);
            }
        }

        let config = Config::load(&meta_dir.join("config.toml"))?;

        Ok(Self {
            root: root.to_path_buf(),
            meta_dir,
            config,
        })
    }

    /// Root of the synced tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The metadata directory
    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    /// Loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the serialized version list
    pub fn version_list_path(&self) -> PathBuf {
        self.meta_dir.join("VersionList.txt")
    }

    /// Blob pool data directory
    pub fn data_dir(&self) -> PathBuf {
        self.meta_dir.join("data")
    }

    /// Scratch directory
    pub fn tmp_dir(&self) -> PathBuf {
        self.meta_dir.join("tmp")
    }

    /// Open the blob pool over this store's data directory
    pub fn blob_pool(&self) -> BlobPool {
        BlobPool::new(self.data_dir(), self.tmp_dir())
    }
}

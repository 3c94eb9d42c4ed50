//! Executes merge-implied filesystem actions on the working tree
//!
//! Each syscall runs with the mute flag held so the resulting OS
//! notifications never re-enter the detector pipeline.

use anyhow::{Context, Result};
use distribox_core::{BlobPool, Config};
use distribox_version::ReplayAction;
use distribox_watcher::MuteFlag;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Apply one replay action under `root`
pub fn apply(
    action: &ReplayAction,
    root: &Path,
    config: &Config,
    pool: &BlobPool,
    mute: &MuteFlag,
) -> Result<()> {
    match action {
        ReplayAction::None => Ok(()),

        ReplayAction::CreateDir { name } => {
            let path = config.denormalize_name(root, name);
            let _guard = mute.mute();
            fs::create_dir_all(&path)
                .with_context(|| format!("Replay mkdir failed: {}", path.display()))
        }

        ReplayAction::WriteFile { name, sha1 } => {
            let path = config.denormalize_name(root, name);
            // The parent directory's own Created event may replay after
            // this one; histories carry no ordering across files
            if let Some(parent) = path.parent() {
                let _guard = mute.mute();
                fs::create_dir_all(parent)?;
            }
            match sha1 {
                None => {
                    let _guard = mute.mute();
                    fs::write(&path, b"")
                        .with_context(|| format!("Replay write failed: {}", path.display()))
                }
                Some(digest) => {
                    let _guard = mute.mute();
                    pool.copy_to(*digest, &path)
                        .with_context(|| format!("Replay copy failed: {}", path.display()))
                }
            }
        }

        ReplayAction::Move { from, to } => {
            let from_path = config.denormalize_name(root, from);
            let to_path = config.denormalize_name(root, to);
            let _guard = mute.mute();
            fs::rename(&from_path, &to_path).with_context(|| {
                format!(
                    "Replay move failed: {} -> {}",
                    from_path.display(),
                    to_path.display()
                )
            })
        }

        ReplayAction::RemoveDir { name } => {
            let path = config.denormalize_name(root, name);
            let _guard = mute.mute();
            // Children carry their own Deleted events but may replay in
            // any order relative to the parent
            match fs::remove_dir_all(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!("Replay rmdir: {} already gone", path.display());
                    Ok(())
                }
                Err(e) => {
                    Err(e).with_context(|| format!("Replay rmdir failed: {}", path.display()))
                }
            }
        }

        ReplayAction::RemoveFile { name } => {
            let path = config.denormalize_name(root, name);
            let _guard = mute.mute();
            match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!("Replay unlink: {} already gone", path.display());
                    Ok(())
                }
                Err(e) => {
                    Err(e).with_context(|| format!("Replay unlink failed: {}", path.display()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distribox_core::hash;
    use std::path::PathBuf;

    struct Fixture {
        _temp: tempfile::TempDir,
        root: PathBuf,
        config: Config,
        pool: BlobPool,
        mute: MuteFlag,
    }

    fn fixture() -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_path_buf();
        let pool = BlobPool::new(root.join("pool-data"), root.join("pool-tmp"));
        Fixture {
            _temp: temp,
            root,
            config: Config::default(),
            pool,
            mute: MuteFlag::new(),
        }
    }

    impl Fixture {
        fn apply(&self, action: ReplayAction) -> Result<()> {
            apply(&action, &self.root, &self.config, &self.pool, &self.mute)
        }
    }

    #[test]
    fn test_create_dir() -> Result<()> {
        let fx = fixture();
        fx.apply(ReplayAction::CreateDir {
            name: "docs/nested".to_string(),
        })?;
        assert!(fx.root.join("docs/nested").is_dir());
        Ok(())
    }

    #[test]
    fn test_write_empty_file() -> Result<()> {
        let fx = fixture();
        fx.apply(ReplayAction::WriteFile {
            name: "a.txt".to_string(),
            sha1: None,
        })?;
        assert_eq!(fs::read(fx.root.join("a.txt"))?, b"");
        Ok(())
    }

    #[test]
    fn test_write_blob_content_overwrites() -> Result<()> {
        let fx = fixture();
        let digest = fx.pool.put(b"hello")?;
        fs::write(fx.root.join("a.txt"), b"stale")?;

        fx.apply(ReplayAction::WriteFile {
            name: "a.txt".to_string(),
            sha1: Some(digest),
        })?;
        assert_eq!(fs::read(fx.root.join("a.txt"))?, b"hello");
        Ok(())
    }

    #[test]
    fn test_write_creates_missing_parents() -> Result<()> {
        let fx = fixture();
        fx.apply(ReplayAction::WriteFile {
            name: "deep/er/a.txt".to_string(),
            sha1: None,
        })?;
        assert!(fx.root.join("deep/er/a.txt").is_file());
        Ok(())
    }

    #[test]
    fn test_write_missing_blob_fails() {
        let fx = fixture();
        let result = fx.apply(ReplayAction::WriteFile {
            name: "a.txt".to_string(),
            sha1: Some(hash::hash_bytes(b"absent")),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_move() -> Result<()> {
        let fx = fixture();
        fs::write(fx.root.join("a.txt"), b"content")?;

        fx.apply(ReplayAction::Move {
            from: "a.txt".to_string(),
            to: "b.txt".to_string(),
        })?;

        assert!(!fx.root.join("a.txt").exists());
        assert_eq!(fs::read(fx.root.join("b.txt"))?, b"content");
        Ok(())
    }

    #[test]
    fn test_remove_file_and_dir_tolerate_absence() -> Result<()> {
        let fx = fixture();
        fx.apply(ReplayAction::RemoveFile {
            name: "never-there.txt".to_string(),
        })?;
        fx.apply(ReplayAction::RemoveDir {
            name: "never-there".to_string(),
        })?;
        Ok(())
    }

    #[test]
    fn test_remove_dir_recursive() -> Result<()> {
        let fx = fixture();
        fs::create_dir_all(fx.root.join("docs"))?;
        fs::write(fx.root.join("docs/straggler.txt"), b"x")?;

        fx.apply(ReplayAction::RemoveDir {
            name: "docs".to_string(),
        })?;
        assert!(!fx.root.join("docs").exists());
        Ok(())
    }

    #[test]
    fn test_none_is_noop() -> Result<()> {
        let fx = fixture();
        fx.apply(ReplayAction::None)?;
        Ok(())
    }
}

//! Content-addressed blob pool
//!
//! A flat directory of immutable files, each named by the lowercase hex
//! SHA-1 of its content. Writes are idempotent and atomic (temp + rename);
//! blobs are never deleted here.

use crate::hash::{self, Sha1Hash};
use anyhow::{Context, Result};
use dashmap::DashSet;
use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// Content-addressed store: digest in, bytes out
pub struct BlobPool {
    /// Directory holding one file per blob, named by digest
    root: PathBuf,
    /// Scratch directory for in-flight writes
    tmp_dir: PathBuf,
    /// Digests known to exist on disk, so repeated puts skip the stat
    known: DashSet<Sha1Hash>,
}

impl BlobPool {
    /// Open a pool over the given data directory
    pub fn new(root: PathBuf, tmp_dir: PathBuf) -> Self {
        Self {
            root,
            tmp_dir,
            known: DashSet::new(),
        }
    }

    /// Store a byte slice, returning its digest
    ///
    /// Identical content always maps to the same digest; putting a digest
    /// that is already present is a no-op.
    pub fn put(&self, data: &[u8]) -> Result<Sha1Hash> {
        let digest = hash::hash_bytes(data);
        if self.exists(digest) {
            return Ok(digest);
        }
        self.write_atomic(digest, |file| file.write_all(data).map_err(Into::into))?;
        Ok(digest)
    }

    /// Store a file's content, streamed from disk
    pub fn put_path(&self, path: &Path) -> Result<Sha1Hash> {
        let digest = hash::hash_file(path)?;
        if self.exists(digest) {
            return Ok(digest);
        }
        self.write_atomic(digest, |file| {
            let source = fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            std::io::copy(&mut BufReader::new(source), file)?;
            Ok(())
        })?;
        Ok(digest)
    }

    /// Read a blob's bytes
    pub fn get(&self, digest: Sha1Hash) -> Result<Vec<u8>> {
        let path = self.blob_path(digest);
        fs::read(&path).with_context(|| format!("Blob not found: {}", digest))
    }

    /// Check whether a digest is present
    pub fn exists(&self, digest: Sha1Hash) -> bool {
        if self.known.contains(&digest) {
            return true;
        }
        if self.blob_path(digest).exists() {
            self.known.insert(digest);
            return true;
        }
        false
    }

    /// Byte length of the blob under a digest
    pub fn size_of(&self, digest: Sha1Hash) -> Result<u64> {
        let meta = fs::metadata(self.blob_path(digest))
            .with_context(|| format!("Blob not found: {}", digest))?;
        Ok(meta.len())
    }

    /// Copy a blob's content to an arbitrary destination file
    pub fn copy_to(&self, digest: Sha1Hash, dest: &Path) -> Result<()> {
        fs::copy(self.blob_path(digest), dest).with_context(|| {
            format!("Failed to copy blob {} to {}", digest, dest.display())
        })?;
        Ok(())
    }

    /// Filesystem path for a digest
    pub fn blob_path(&self, digest: Sha1Hash) -> PathBuf {
        self.root.join(digest.to_hex())
    }

    /// Write-to-temp-then-rename so a partial blob is never observable
    /// under its final name. Concurrent puts of the same digest race only
    /// on the rename, which is a safe last-writer-wins of identical bytes.
    fn write_atomic(
        &self,
        digest: Sha1Hash,
        fill: impl FnOnce(&mut fs::File) -> Result<()>,
    ) -> Result<()> {
        fs::create_dir_all(&self.tmp_dir)?;
        let temp_path = self
            .tmp_dir
            .join(format!("{}-{}", uuid::Uuid::new_v4(), digest.to_hex()));

        let mut temp_file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        fill(&mut temp_file)?;
        temp_file.sync_all()?;
        drop(temp_file);

        fs::create_dir_all(&self.root)?;
        fs::rename(&temp_path, self.blob_path(digest))?;
        self.known.insert(digest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(dir: &Path) -> BlobPool {
        BlobPool::new(dir.join("data"), dir.join("tmp"))
    }

    #[test]
    fn test_put_get_roundtrip() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let pool = pool(temp_dir.path());

        let digest = pool.put(b"hello")?;
        assert_eq!(digest.to_hex(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        assert_eq!(pool.get(digest)?, b"hello");
        Ok(())
    }

    #[test]
    fn test_put_idempotent() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let pool = pool(temp_dir.path());

        let d1 = pool.put(b"same content")?;
        let d2 = pool.put(b"same content")?;
        let d3 = pool.put(b"same content")?;

        assert_eq!(d1, d2);
        assert_eq!(d2, d3);
        assert_eq!(pool.get(d1)?, b"same content");
        Ok(())
    }

    #[test]
    fn test_put_path_streams_file() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let pool = pool(temp_dir.path());

        let source = temp_dir.path().join("source.bin");
        let data = vec![0x5A; 300 * 1024];
        fs::write(&source, &data)?;

        let digest = pool.put_path(&source)?;
        assert_eq!(digest, hash::hash_bytes(&data));
        assert_eq!(pool.size_of(digest)?, data.len() as u64);
        Ok(())
    }

    #[test]
    fn test_exists() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let pool = pool(temp_dir.path());

        let missing = hash::hash_bytes(b"never stored");
        assert!(!pool.exists(missing));

        let digest = pool.put(b"stored")?;
        assert!(pool.exists(digest));
        Ok(())
    }

    #[test]
    fn test_exists_sees_preexisting_files() -> Result<()> {
        // A second pool over the same directory must find blobs the first wrote
        let temp_dir = tempfile::tempdir()?;
        let digest = pool(temp_dir.path()).put(b"persisted")?;

        let reopened = pool(temp_dir.path());
        assert!(reopened.exists(digest));
        assert_eq!(reopened.get(digest)?, b"persisted");
        Ok(())
    }

    #[test]
    fn test_get_missing_is_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pool = pool(temp_dir.path());

        let missing = Sha1Hash::from_bytes([0xFF; 20]);
        assert!(pool.get(missing).is_err());
        assert!(pool.size_of(missing).is_err());
    }

    #[test]
    fn test_no_temp_leftovers() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let pool = pool(temp_dir.path());

        pool.put(b"one")?;
        pool.put(b"two")?;

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path().join("tmp"))?.collect();
        assert!(leftovers.is_empty(), "temp dir should be empty after puts");
        Ok(())
    }

    #[test]
    fn test_copy_to() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let pool = pool(temp_dir.path());

        let digest = pool.put(b"copy me")?;
        let dest = temp_dir.path().join("out.txt");
        pool.copy_to(digest, &dest)?;

        assert_eq!(fs::read(&dest)?, b"copy me");
        Ok(())
    }

    #[test]
    fn test_empty_blob() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let pool = pool(temp_dir.path());

        let digest = pool.put(b"")?;
        assert_eq!(pool.get(digest)?, b"");
        assert_eq!(pool.size_of(digest)?, 0);
        Ok(())
    }
}

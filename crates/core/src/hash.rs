//! SHA-1 hashing primitives for content-addressed storage

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

/// A SHA-1 digest (20 bytes) of raw file content
///
/// Serializes as a 40-character lowercase hex string, which is also the
/// blob pool filename for the content it identifies.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Sha1Hash([u8; 20]);

impl Sha1Hash {
    /// Create a new Sha1Hash from bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Convert to hex string (40 characters)
    pub fn to_hex(&self) -> String {
        const HEX_CHARS: &[u8] = b"0123456789abcdef";
        let mut hex = String::with_capacity(40);
        for &byte in &self.0 {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xf) as usize] as char);
        }
        hex
    }

    /// Parse from hex string (40 characters)
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != 40 {
            anyhow::bail!(
                "Invalid hex length: expected 40 characters, got {}",
                hex.len()
            );
        }

        let mut bytes = [0u8; 20];
        for i in 0..20 {
            let high = hex_char_to_nibble(hex.as_bytes()[i * 2])?;
            let low = hex_char_to_nibble(hex.as_bytes()[i * 2 + 1])?;
            bytes[i] = (high << 4) | low;
        }
        Ok(Self(bytes))
    }
}

/// Helper function to convert a hex character to a nibble
fn hex_char_to_nibble(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => anyhow::bail!("Invalid hex character: {}", c as char),
    }
}

impl std::fmt::Debug for Sha1Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sha1Hash({})", self.to_hex())
    }
}

impl std::fmt::Display for Sha1Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Sha1Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha1Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Sha1Hash::from_hex(&hex).map_err(de::Error::custom)
    }
}

/// Hash a byte slice
pub fn hash_bytes(data: &[u8]) -> Sha1Hash {
    let mut hasher = Sha1::new();
    hasher.update(data);
    finalize(hasher)
}

/// Hash everything a reader yields, streaming in 64 KiB chunks
pub fn hash_reader(reader: &mut impl Read) -> Result<Sha1Hash> {
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(finalize(hasher))
}

/// Hash a file's content without loading it whole
pub fn hash_file(path: &Path) -> Result<Sha1Hash> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    hash_reader(&mut BufReader::new(file))
}

/// Hash a file with stability verification (double-stat pattern)
///
/// Ensures the file is not changing during the read by comparing metadata
/// before and after. Editors and build tools rewrite files while the
/// detector is looking at them; an unstable read would log a digest that
/// matches no content that ever existed on disk.
pub fn hash_file_stable(path: &Path, max_retries: u8) -> Result<Sha1Hash> {
    use std::fs;

    for attempt in 0..max_retries {
        let stat1 = fs::metadata(path)
            .with_context(|| format!("Failed to stat (pre): {}", path.display()))?;

        let hash = hash_file(path)?;

        let stat2 = fs::metadata(path)
            .with_context(|| format!("Failed to stat (post): {}", path.display()))?;

        if stat1.len() == stat2.len() && stat1.modified()? == stat2.modified()? {
            return Ok(hash);
        }

        if attempt < max_retries - 1 {
            let backoff_ms = 50 << attempt; // 50ms, 100ms, 200ms
            sleep(Duration::from_millis(backoff_ms));
        }
    }

    Err(anyhow::anyhow!(
        "File {} is unstable after {} read attempts",
        path.display(),
        max_retries
    ))
}

fn finalize(hasher: Sha1) -> Sha1Hash {
    let result = hasher.finalize();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&result);
    Sha1Hash::from_bytes(bytes)
}

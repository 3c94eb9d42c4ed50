//! Distribox Core - storage primitives for the Distribox sync system
//!
//! This crate provides the foundational layer:
//! - SHA-1 content hashing
//! - The content-addressed blob pool
//! - The 100-nanosecond tick clock with strict monotonicity
//! - Configuration and `.Distribox/` on-disk layout

pub mod blob;
pub mod clock;
pub mod config;
pub mod hash;
pub mod store;

// Re-export main types for convenience
pub use blob::BlobPool;
pub use clock::{now_ticks, TickClock, Ticks};
pub use config::Config;
pub use hash::Sha1Hash;
pub use store::Store;

/// Common result type used throughout distribox-core
pub type Result<T> = anyhow::Result<T>;

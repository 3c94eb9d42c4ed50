//! Replication glue for Distribox
//!
//! This crate ties the change detector to the version store and moves
//! deltas between peers:
//! - `controller`: maps canonical detector events onto version list mutations
//! - `replay`: executes merge-implied filesystem actions with the detector muted
//! - `bundle`: builds and accepts the zip delta bundles
//! - `transport`: the contract with whatever delivers bundle bytes
//! - `engine`: one peer's assembled pipeline

pub mod bundle;
pub mod controller;
pub mod engine;
pub mod replay;
pub mod transport;

pub use controller::VersionController;
pub use engine::Engine;
pub use transport::{LoopbackTransport, PeerTransport};

/// Result type for sync operations
pub type Result<T> = anyhow::Result<T>;

//! The contract with whatever moves bundle bytes between peers
//!
//! The core is indifferent to framing, addressing, and reliability: it
//! hands a transport whole archive payloads and receives whole payloads
//! back through `Engine::accept`. Peer discovery and wire protocol live
//! with the caller (the CLI daemon ships a length-prefixed TCP framing).

use crate::engine::Engine;
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;

/// Delivers one whole bundle payload to a peer
pub trait PeerTransport {
    fn send(&mut self, bundle: &[u8]) -> Result<()>;
}

/// In-process transport: delivery is a direct Accept on the target
/// engine. Used by tests and single-machine setups.
pub struct LoopbackTransport {
    target: Arc<Mutex<Engine>>,
}

impl LoopbackTransport {
    pub fn new(target: Arc<Mutex<Engine>>) -> Self {
        Self { target }
    }
}

impl PeerTransport for LoopbackTransport {
    fn send(&mut self, bundle: &[u8]) -> Result<()> {
        self.target.lock().accept(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distribox_core::{Config, Store};
    use std::fs;

    #[test]
    fn test_loopback_delivers_into_engine() -> Result<()> {
        let sender_dir = tempfile::tempdir()?;
        Store::init(sender_dir.path(), Config::default())?;
        let mut sender = Engine::open(sender_dir.path())?;

        let path = sender_dir.path().join("a.txt");
        fs::write(&path, b"")?;
        sender.raw_queue().push(distribox_watcher::RawEvent {
            kind: distribox_watcher::RawEventKind::Created,
            path,
            old_path: None,
        });
        sender.tick()?;

        let receiver_dir = tempfile::tempdir()?;
        Store::init(receiver_dir.path(), Config::default())?;
        let receiver = Arc::new(Mutex::new(Engine::open(receiver_dir.path())?));

        let bundle_path = sender.build_bundle()?;
        let bytes = fs::read(&bundle_path)?;

        let mut transport = LoopbackTransport::new(Arc::clone(&receiver));
        transport.send(&bytes)?;

        assert_eq!(receiver.lock().list().alive_count(), 1);
        assert!(receiver_dir.path().join("a.txt").exists());
        Ok(())
    }
}

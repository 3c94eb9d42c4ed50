//! The detector mute flag
//!
//! Every filesystem mutation the merge replay performs would otherwise
//! come straight back through the OS watcher as a fresh raw event. The
//! flag is set around each individual replay syscall (and the acceptor
//! additionally holds it across a whole replay run, since notifications
//! are delivered asynchronously); while it is set, the watcher thread
//! drops notifications instead of enqueuing them. Guards nest, so the
//! flag counts holders. Coarse suppression is the point — relaxed
//! atomics are enough.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Process-wide suppression flag, shared between the watcher thread and
/// whoever replays merges
#[derive(Clone, Default)]
pub struct MuteFlag {
    holders: Arc<AtomicUsize>,
}

impl MuteFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read by the watcher thread on every raw notification
    pub fn is_muted(&self) -> bool {
        self.holders.load(Ordering::Relaxed) > 0
    }

    /// Set the flag for the lifetime of the returned guard
    ///
    /// Hold a guard across replay writes only; do not hold one across
    /// unrelated blocking work.
    pub fn mute(&self) -> MuteGuard {
        self.holders.fetch_add(1, Ordering::Relaxed);
        MuteGuard { flag: self.clone() }
    }
}

/// Releases one hold on the mute flag on drop
pub struct MuteGuard {
    flag: MuteFlag,
}

impl Drop for MuteGuard {
    fn drop(&mut self) {
        self.flag.holders.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_sets_and_clears() {
        let flag = MuteFlag::new();
        assert!(!flag.is_muted());

        {
            let _guard = flag.mute();
            assert!(flag.is_muted());
        }
        assert!(!flag.is_muted());
    }

    #[test]
    fn test_guards_nest() {
        let flag = MuteFlag::new();
        let outer = flag.mute();
        {
            let _inner = flag.mute();
            assert!(flag.is_muted());
        }
        // Inner release must not unmute while the outer guard is held
        assert!(flag.is_muted());
        drop(outer);
        assert!(!flag.is_muted());
    }

    #[test]
    fn test_clones_observe_guard() {
        let flag = MuteFlag::new();
        let observer = flag.clone();

        let guard = flag.mute();
        assert!(observer.is_muted());
        drop(guard);
        assert!(!observer.is_muted());
    }
}

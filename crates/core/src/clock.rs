//! Event timestamps in 100-nanosecond ticks
//!
//! Every event the detector emits carries a tick count since the Unix
//! epoch (UTC). The clock never hands out the same value twice: when the
//! system clock has not advanced past the previous stamp, the next stamp
//! is the previous one plus a single tick. Event ordering across all
//! histories on one peer rides on this.

use std::time::{SystemTime, UNIX_EPOCH};

/// 100-nanosecond intervals since the Unix epoch, UTC
pub type Ticks = u64;

/// Ticks per second
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Current wall-clock time in ticks
pub fn now_ticks() -> Ticks {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    elapsed.as_secs() * TICKS_PER_SECOND + u64::from(elapsed.subsec_nanos()) / 100
}

/// Strictly monotonic tick source
///
/// Seed it with the greatest timestamp already on record so monotonicity
/// holds across restarts.
#[derive(Debug, Clone, Default)]
pub struct TickClock {
    last: Ticks,
}

impl TickClock {
    /// Create a clock that will never emit a value at or below `last`
    pub fn seeded(last: Ticks) -> Self {
        Self { last }
    }

    /// Next stamp: wall-clock now, bumped past the previous stamp when
    /// the wall clock has not moved (or moved backwards)
    pub fn next(&mut self) -> Ticks {
        let now = now_ticks();
        self.last = if now > self.last { now } else { self.last + 1 };
        self.last
    }

    /// The most recent stamp handed out
    pub fn last(&self) -> Ticks {
        self.last
    }
}

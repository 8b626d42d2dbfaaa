//! Timestamp utilities and clock sources
//!
//! Two time bases are needed by the controller:
//! - **Monotonic** (`tokio::time::Instant`): activity stamps, cooldowns, windows
//! - **Wall clock** (epoch milliseconds): sleep timer targets that survive restart
//!
//! All monotonic readings go through `tokio::time::Instant` so a paused test
//! runtime (`start_paused = true`) drives every window and cooldown.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Current wall-clock time in milliseconds since the Unix epoch
    fn epoch_ms(&self) -> i64;
}

/// Production clock: runtime monotonic time plus system wall time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock whose wall time is derived from the runtime's monotonic time
///
/// Wall time = anchor epoch + elapsed monotonic time since construction.
/// Under a paused runtime both bases advance together, which keeps sleep
/// timer expiry and cooldown windows consistent in tests.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    anchor: Instant,
    anchor_epoch_ms: i64,
}

impl AnchoredClock {
    /// Anchor at the current system wall time
    pub fn new() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }

    /// Anchor at an explicit wall time
    pub fn starting_at(epoch_ms: i64) -> Self {
        Self {
            anchor: Instant::now(),
            anchor_epoch_ms: epoch_ms,
        }
    }
}

impl Default for AnchoredClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> i64 {
        self.anchor_epoch_ms + self.anchor.elapsed().as_millis() as i64
    }
}

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// True if `last` happened no longer than `window` before `now`
///
/// `None` (never happened) is never within a window.
pub fn is_within(now: Instant, last: Option<Instant>, window: Duration) -> bool {
    match last {
        Some(at) => now.saturating_duration_since(at) <= window,
        None => false,
    }
}

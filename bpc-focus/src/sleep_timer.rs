//! Sleep timer
//!
//! A persisted wall-clock target (epoch milliseconds, 0 = disabled). When the
//! target is reached playback pauses, and the target is then cleared whether
//! or not the pause succeeded so it fires at most once. A target already in
//! the past when it is (re)loaded, e.g. after a restart, is cleared without
//! pausing.

use std::time::Duration;

/// What to do with a newly observed target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTimerPlan {
    Disabled,
    /// Target already passed; clear without pausing
    Stale,
    Armed { delay: Duration },
}

/// State at a scheduled expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTimerCheck {
    /// Nothing armed (cleared concurrently)
    Disabled,
    /// Target reached; pause and clear
    Due,
    /// Woke early against the wall clock; wait the remainder
    NotYet { remaining: Duration },
}

/// Armed target bookkeeping
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepTimerScheduler {
    target_ms: i64,
}

impl SleepTimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_ms(&self) -> i64 {
        self.target_ms
    }

    pub fn is_armed(&self) -> bool {
        self.target_ms > 0
    }

    /// Plan a new target observed at wall time `now_ms`
    pub fn plan(&mut self, target_ms: i64, now_ms: i64) -> SleepTimerPlan {
        if target_ms <= 0 {
            self.target_ms = 0;
            return SleepTimerPlan::Disabled;
        }
        if target_ms <= now_ms {
            self.target_ms = 0;
            return SleepTimerPlan::Stale;
        }

        self.target_ms = target_ms;
        SleepTimerPlan::Armed {
            delay: Duration::from_millis((target_ms - now_ms) as u64),
        }
    }

    /// Evaluate a scheduled expiry at wall time `now_ms`
    ///
    /// `Due` disarms the timer.
    pub fn check(&mut self, now_ms: i64) -> SleepTimerCheck {
        if !self.is_armed() {
            return SleepTimerCheck::Disabled;
        }
        if now_ms < self.target_ms {
            return SleepTimerCheck::NotYet {
                remaining: Duration::from_millis((self.target_ms - now_ms) as u64),
            };
        }
        self.target_ms = 0;
        SleepTimerCheck::Due
    }

    pub fn clear(&mut self) {
        self.target_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_variants() {
        let mut timer = SleepTimerScheduler::new();
        assert_eq!(timer.plan(0, 1_000), SleepTimerPlan::Disabled);
        assert_eq!(timer.plan(500, 1_000), SleepTimerPlan::Stale);
        assert!(!timer.is_armed());

        assert_eq!(
            timer.plan(61_000, 1_000),
            SleepTimerPlan::Armed {
                delay: Duration::from_secs(60)
            }
        );
        assert_eq!(timer.target_ms(), 61_000);
    }

    #[test]
    fn test_check_fires_once() {
        let mut timer = SleepTimerScheduler::new();
        timer.plan(10_000, 0);

        assert_eq!(
            timer.check(9_000),
            SleepTimerCheck::NotYet {
                remaining: Duration::from_secs(1)
            }
        );
        assert_eq!(timer.check(10_000), SleepTimerCheck::Due);
        assert_eq!(timer.check(10_001), SleepTimerCheck::Disabled);
    }

    #[test]
    fn test_replacement_target() {
        let mut timer = SleepTimerScheduler::new();
        timer.plan(10_000, 0);
        timer.plan(20_000, 5_000);
        assert_eq!(
            timer.check(10_000),
            SleepTimerCheck::NotYet {
                remaining: Duration::from_secs(10)
            }
        );
    }
}

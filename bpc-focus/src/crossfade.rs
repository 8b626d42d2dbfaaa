//! Crossfade volume ramps on natural track transitions
//!
//! When a track ends on its own (or repeats) and a crossfade duration is
//! configured, the incoming track's volume ramps from silence to the current
//! target volume. User-driven jumps never ramp.
//!
//! The coordinator holds ramp state only. The controller drives it by
//! scheduling `TaskKey::CrossfadeStep` ticks, writing each returned volume to
//! the engine. The target is passed on every step so a duck or volume change
//! mid-ramp is honored.

use crate::events::TransitionReason;
use bpc_common::FadeCurve;
use std::time::Duration;
use tokio::time::Instant;

/// Result of advancing an active ramp
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RampStep {
    /// Write this volume and schedule another step
    Continue(f32),
    /// Write this volume; the ramp is over
    Finished(f32),
}

#[derive(Debug, Clone)]
struct Ramp {
    started: Instant,
    track_id: Option<String>,
}

/// Crossfade ramp state
#[derive(Debug, Clone)]
pub struct CrossfadeCoordinator {
    duration: Duration,
    step: Duration,
    curve: FadeCurve,
    ramp: Option<Ramp>,
}

impl CrossfadeCoordinator {
    pub fn new(duration: Duration, step: Duration, curve: FadeCurve) -> Self {
        Self {
            duration,
            step,
            curve,
            ramp: None,
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn step_interval(&self) -> Duration {
        self.step
    }

    /// Transition qualifies for a ramp
    pub fn should_ramp(&self, reason: TransitionReason) -> bool {
        reason.is_natural() && !self.duration.is_zero()
    }

    /// Start a ramp at `now`; the caller writes volume 0.0 immediately
    ///
    /// Replaces any ramp already in progress.
    pub fn begin(&mut self, now: Instant, track_id: Option<String>) -> f32 {
        self.ramp = Some(Ramp {
            started: now,
            track_id,
        });
        0.0
    }

    /// Advance the ramp toward `target`; `None` when no ramp is active
    pub fn step(&mut self, now: Instant, target: f32) -> Option<RampStep> {
        let ramp = self.ramp.as_ref()?;
        let elapsed = now.saturating_duration_since(ramp.started);

        if elapsed >= self.duration {
            self.ramp = None;
            return Some(RampStep::Finished(target));
        }

        let progress = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        Some(RampStep::Continue(self.curve.interpolate(0.0, target, progress)))
    }

    /// Abandon the ramp; true if one was running
    pub fn cancel(&mut self) -> bool {
        self.ramp.take().is_some()
    }

    pub fn is_active(&self) -> bool {
        self.ramp.is_some()
    }

    pub fn track_id(&self) -> Option<&str> {
        self.ramp.as_ref().and_then(|r| r.track_id.as_deref())
    }
}

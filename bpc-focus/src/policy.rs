//! Focus-loss classification
//!
//! The engine sometimes reports "paused because of focus loss" without the
//! controller having seen which kind of loss caused it. The rules that turn
//! that report into a pause reason live here so they can be tuned and tested
//! on their own.

use crate::events::{FocusSignal, PauseReason};

/// Inputs available when the engine reports a focus-loss pause
#[derive(Debug, Clone, Copy, Default)]
pub struct FocusLossContext {
    /// Most recent OS focus signal, if any was seen
    pub last_signal: Option<FocusSignal>,
    /// Playback was running when the loss began
    pub was_playing_before_loss: bool,
    /// A remote (automotive-class) controller was recently active
    pub remote_recently_active: bool,
    /// The controller started within the engine-start window
    pub recently_started: bool,
}

/// Pause reason for an engine-reported focus-loss pause
///
/// A known loss signal is authoritative. A can-duck loss that still paused
/// the engine is treated as transient.
pub fn resolve_engine_focus_pause(ctx: &FocusLossContext) -> PauseReason {
    match ctx.last_signal {
        Some(FocusSignal::LossTransient) | Some(FocusSignal::LossTransientCanDuck) => {
            PauseReason::FocusLossTransient
        }
        Some(FocusSignal::LossPermanent) => PauseReason::FocusLossPermanent,
        Some(FocusSignal::Gain) | None => classify_ambiguous_focus_loss(ctx),
    }
}

/// Heuristic used when no loss signal explains the pause
///
/// Ambiguous losses right after startup or while a car head unit is driving
/// playback are treated as transient so recovery can resume them. Otherwise
/// the loss is permanent.
pub fn classify_ambiguous_focus_loss(ctx: &FocusLossContext) -> PauseReason {
    if ctx.was_playing_before_loss && (ctx.remote_recently_active || ctx.recently_started) {
        PauseReason::FocusLossTransient
    } else {
        PauseReason::FocusLossPermanent
    }
}

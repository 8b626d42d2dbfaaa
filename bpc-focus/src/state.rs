//! Controller state and status snapshot

use crate::events::{FocusSignal, PauseReason};
use crate::scheduler::TaskKey;
use serde::Serialize;

/// Volume bookkeeping for can-duck losses
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DuckState {
    pub is_ducked: bool,
    /// Volume to restore when the duck ends
    pub normal_volume: f32,
}

impl DuckState {
    pub fn new(normal_volume: f32) -> Self {
        Self {
            is_ducked: false,
            normal_volume,
        }
    }
}

/// Mutable focus state owned by the controller task
#[derive(Debug, Clone)]
pub struct FocusState {
    pub pause_reason: PauseReason,
    pub last_signal: Option<FocusSignal>,
    pub was_playing_before_loss: bool,
    pub duck: DuckState,
    /// Volume the listener chose, independent of ducking and ramps
    pub target_volume: f32,
}

impl FocusState {
    pub fn new(volume: f32) -> Self {
        Self {
            pause_reason: PauseReason::None,
            last_signal: None,
            was_playing_before_loss: false,
            duck: DuckState::new(volume),
            target_volume: volume,
        }
    }
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub pause_reason: PauseReason,
    pub last_focus_signal: Option<FocusSignal>,
    pub was_playing_before_loss: bool,
    pub duck: DuckState,
    pub engine_playing: bool,
    pub remote_controller_active: bool,
    pub external_controller_active: bool,
    pub notification_bound: bool,
    pub crossfade_active: bool,
    pub sleep_timer_target_ms: i64,
    pub pending_tasks: Vec<TaskKey>,
}

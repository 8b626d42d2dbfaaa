//! Controller input events
//!
//! Every input (OS focus callbacks, route broadcasts, engine callbacks,
//! preference updates, timer expiries, controller connections and explicit
//! user commands) is folded into one `ControllerEvent` and processed in order
//! by a single task. Nothing else mutates controller state.
//!
//! Decision *outputs* are `bpc_common::events::FocusNotice`.

use crate::scheduler::TaskKey;
use serde::{Deserialize, Serialize};

pub use bpc_common::events::{FocusNotice, FocusSignal, PauseReason, RecoveryCategory};

/// Single tagged union fed into the controller queue
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Focus(FocusSignal),
    Route(RouteEvent),
    Engine(EngineEvent),
    Preference(PreferenceEvent),
    Timer(TimerEvent),
    Client(ClientEvent),
    Command(UserCommand),
}

/// Output route changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteEvent {
    /// Current output removed (headphones unplugged, Bluetooth dropped)
    BecomingNoisy,
}

/// Why the engine's play-when-ready flag changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayChangeReason {
    UserRequest,
    AudioFocusLoss,
    Remote,
    Other,
}

/// Why the engine moved to another track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// Previous track ended
    Auto,
    /// Single-track repeat wrapped around
    Repeat,
    /// Explicit jump to another queue item
    Seek,
    /// Queue replaced
    PlaylistChanged,
}

impl TransitionReason {
    /// Natural transitions are not user-driven queue jumps
    pub fn is_natural(&self) -> bool {
        matches!(self, TransitionReason::Auto | TransitionReason::Repeat)
    }
}

/// Engine callbacks, consolidated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "snake_case")]
pub enum EngineEvent {
    PlayWhenReadyChanged {
        play_when_ready: bool,
        reason: PlayChangeReason,
    },
    IsPlayingChanged {
        playing: bool,
    },
    TrackTransition {
        #[serde(default)]
        track_id: Option<String>,
        reason: TransitionReason,
    },
    VolumeChanged {
        volume: f32,
    },
    AudioSessionChanged {
        session_id: i32,
    },
    PlaybackError {
        message: String,
    },
}

/// Reactive preference updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "preference", content = "value", rename_all = "snake_case")]
pub enum PreferenceEvent {
    NotificationVisible(bool),
    CrossfadeMs(u64),
    PauseOnNoisy(bool),
    ResumeOnFocus(bool),
    /// Epoch milliseconds; 0 disables
    SleepTimerTarget(i64),
}

/// Expiry of a scheduled continuation
///
/// `generation` identifies which schedule request produced it; expiries from
/// superseded or cancelled requests are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub key: TaskKey,
    pub generation: u64,
}

/// Transport-control client activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientEvent {
    Connected { identifier: String },
}

/// Explicit user transport commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserCommand {
    Play,
    Pause,
}

impl From<FocusSignal> for ControllerEvent {
    fn from(signal: FocusSignal) -> Self {
        ControllerEvent::Focus(signal)
    }
}

impl From<RouteEvent> for ControllerEvent {
    fn from(event: RouteEvent) -> Self {
        ControllerEvent::Route(event)
    }
}

impl From<EngineEvent> for ControllerEvent {
    fn from(event: EngineEvent) -> Self {
        ControllerEvent::Engine(event)
    }
}

impl From<PreferenceEvent> for ControllerEvent {
    fn from(event: PreferenceEvent) -> Self {
        ControllerEvent::Preference(event)
    }
}

impl From<UserCommand> for ControllerEvent {
    fn from(command: UserCommand) -> Self {
        ControllerEvent::Command(command)
    }
}

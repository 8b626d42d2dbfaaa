//! Event types for the BPC decision stream
//!
//! The controller publishes every decision it takes (state transitions,
//! transport commands, fired or suppressed recoveries, ignored route events)
//! as a `FocusNotice` on an `EventBus`. Subscribers are optional: the bus is
//! diagnostic output, never an input to the state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why playback is currently paused
///
/// Exactly one value holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    #[default]
    None,
    FocusLossTransient,
    FocusLossPermanent,
    BecomingNoisy,
    UserPause,
}

impl PauseReason {
    /// States that no focus gain or heuristic recovery may leave
    pub fn blocks_auto_resume(&self) -> bool {
        matches!(self, PauseReason::UserPause | PauseReason::BecomingNoisy)
    }
}

impl std::fmt::Display for PauseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PauseReason::None => "none",
            PauseReason::FocusLossTransient => "focus_loss_transient",
            PauseReason::FocusLossPermanent => "focus_loss_permanent",
            PauseReason::BecomingNoisy => "becoming_noisy",
            PauseReason::UserPause => "user_pause",
        };
        f.write_str(s)
    }
}

/// OS-delivered audio focus change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusSignal {
    Gain,
    LossTransient,
    LossTransientCanDuck,
    LossPermanent,
}

/// Recovery categories, each with its own cooldown window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryCategory {
    /// Resume after a permanent loss that never received a clean gain
    ForcedPermanent,
    /// Resume after a transient loss that never received a clean gain
    Transient,
    /// Second attempt when a fired recovery is not observed playing
    PostRecoveryRetry,
}

impl std::fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecoveryCategory::ForcedPermanent => "forced_permanent",
            RecoveryCategory::Transient => "transient",
            RecoveryCategory::PostRecoveryRetry => "post_recovery_retry",
        };
        f.write_str(s)
    }
}

/// Why a recovery attempt did not resume playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    Cooldown,
    CommunicationMode,
    OtherAppActive,
    UserPaused,
    BecameNoisy,
    AlreadyPlaying,
    OutsideRetryWindow,
    FocusDenied,
    FocusRequestFailed,
}

/// Why a noisy-route event did not pause playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoisyIgnoredReason {
    PreferenceDisabled,
    NotPlaying,
    RemoteControllerActive,
    ExternalOutputPresent,
}

/// Transport command issued to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportAction {
    Play,
    Pause,
}

/// Controller decision notices
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FocusNotice {
    /// Pause reason transitioned
    PauseReasonChanged {
        old_reason: PauseReason,
        new_reason: PauseReason,
        timestamp: DateTime<Utc>,
    },

    /// Play or pause was issued to the engine
    TransportCommand {
        action: TransportAction,
        cause: String,
        timestamp: DateTime<Utc>,
    },

    /// Volume lowered for a can-duck focus loss
    Ducked {
        normal_volume: f32,
        duck_volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// Pre-duck volume restored
    DuckRestored {
        volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// Delayed recovery check scheduled
    RecoveryScheduled {
        category: RecoveryCategory,
        delay_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Recovery resumed playback
    RecoveryFired {
        category: RecoveryCategory,
        timestamp: DateTime<Utc>,
    },

    /// Recovery check ran but did not resume
    RecoverySuppressed {
        category: RecoveryCategory,
        reason: SuppressionReason,
        timestamp: DateTime<Utc>,
    },

    /// Noisy-route event did not pause playback
    NoisyRouteIgnored {
        reason: NoisyIgnoredReason,
        timestamp: DateTime<Utc>,
    },

    /// Crossfade volume ramp started
    CrossfadeStarted {
        track_id: Option<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Crossfade volume ramp reached its target
    CrossfadeCompleted {
        track_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Transport surface bound or unbound
    NotificationVisibility {
        bound: bool,
        timestamp: DateTime<Utc>,
    },

    /// Binding or clearing the transport surface failed
    NotificationFailed {
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Sleep timer armed for a wall-clock target
    SleepTimerScheduled {
        target_ms: i64,
        timestamp: DateTime<Utc>,
    },

    /// Sleep timer reached its target
    SleepTimerFired {
        paused: bool,
        timestamp: DateTime<Utc>,
    },

    /// Persisted sleep timer target cleared
    SleepTimerCleared {
        stale: bool,
        timestamp: DateTime<Utc>,
    },
}

impl FocusNotice {
    /// Get notice type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            FocusNotice::PauseReasonChanged { .. } => "PauseReasonChanged",
            FocusNotice::TransportCommand { .. } => "TransportCommand",
            FocusNotice::Ducked { .. } => "Ducked",
            FocusNotice::DuckRestored { .. } => "DuckRestored",
            FocusNotice::RecoveryScheduled { .. } => "RecoveryScheduled",
            FocusNotice::RecoveryFired { .. } => "RecoveryFired",
            FocusNotice::RecoverySuppressed { .. } => "RecoverySuppressed",
            FocusNotice::NoisyRouteIgnored { .. } => "NoisyRouteIgnored",
            FocusNotice::CrossfadeStarted { .. } => "CrossfadeStarted",
            FocusNotice::CrossfadeCompleted { .. } => "CrossfadeCompleted",
            FocusNotice::NotificationVisibility { .. } => "NotificationVisibility",
            FocusNotice::NotificationFailed { .. } => "NotificationFailed",
            FocusNotice::SleepTimerScheduled { .. } => "SleepTimerScheduled",
            FocusNotice::SleepTimerFired { .. } => "SleepTimerFired",
            FocusNotice::SleepTimerCleared { .. } => "SleepTimerCleared",
        }
    }
}

/// One-to-many notice broadcaster
///
/// Slow subscribers lag and lose the oldest notices; the controller never
/// blocks on delivery.
pub struct EventBus {
    tx: broadcast::Sender<FocusNotice>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future notices
    pub fn subscribe(&self) -> broadcast::Receiver<FocusNotice> {
        self.tx.subscribe()
    }

    /// Emit a notice to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        notice: FocusNotice,
    ) -> Result<usize, broadcast::error::SendError<FocusNotice>> {
        self.tx.send(notice)
    }

    /// Emit a notice, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, notice: FocusNotice) {
        let _ = self.tx.send(notice);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

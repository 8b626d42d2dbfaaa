//! Scripted scenarios against the simulated rig
//!
//! A scenario is a TOML file of timed steps:
//!
//! ```toml
//! name = "car hand-off"
//! initial_playing = true
//! tail_ms = 3000
//!
//! [[step]]
//! at_ms = 0
//! action = "focus"
//! signal = "loss_permanent"
//! ```
//!
//! Steps run in `at_ms` order on the real runtime clock. After the last step
//! plus `tail_ms`, the runner reports the final controller status, every
//! engine call and every notice.

use crate::audio_system::FocusOutcome;
use crate::config::FocusConfig;
use crate::controller::{ControllerHandle, FocusController};
use crate::effects::TrackAudioSettings;
use crate::engine::EngineCall;
use crate::error::{Error, Result};
use crate::events::{
    EngineEvent, FocusNotice, FocusSignal, PlayChangeReason, RouteEvent, TransitionReason,
};
use crate::notification::BindFailure;
use crate::preferences::{PlaybackPreferences, PreferenceHub};
use crate::route::{OutputDevice, OutputDeviceKind};
use crate::simulation::SimulatedRig;
use crate::state::ControllerStatus;
use bpc_common::Clock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

fn default_volume() -> f32 {
    1.0
}

/// Parsed scenario file
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,

    /// Engine volume at start
    #[serde(default = "default_volume")]
    pub initial_volume: f32,

    /// Engine already playing at start
    #[serde(default)]
    pub initial_playing: bool,

    /// Seed preferences; when absent the persisted preferences are used
    #[serde(default)]
    pub preferences: Option<PlaybackPreferences>,

    /// Wait after the last step before reporting
    #[serde(default)]
    pub tail_ms: u64,

    #[serde(default, rename = "step")]
    pub steps: Vec<ScenarioStep>,
}

/// One timed step
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioStep {
    /// Offset from scenario start
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ScenarioAction,
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioAction {
    /// OS focus callback
    Focus { signal: FocusSignal },
    /// Engine play-when-ready callback
    PlayWhenReady {
        value: bool,
        reason: PlayChangeReason,
    },
    /// Engine starts or stops on its own
    EnginePlaying { playing: bool },
    TrackTransition {
        #[serde(default)]
        track_id: Option<String>,
        reason: TransitionReason,
    },
    /// Listener changed the volume
    Volume { volume: f32 },
    AudioSession { session_id: i32 },
    PlaybackError { message: String },
    BecomingNoisy,
    AttachOutput { kind: OutputDeviceKind, name: String },
    DetachOutput { kind: OutputDeviceKind },
    ClientConnected { identifier: String },
    UserPlay,
    UserPause,
    NotificationVisible { value: bool },
    CrossfadeMs { value: u64 },
    PauseOnNoisy { value: bool },
    ResumeOnFocus { value: bool },
    /// Arm the sleep timer `delay_ms` from now (negative = already past)
    SleepTimerIn { delay_ms: i64 },
    CommunicationMode { active: bool },
    OtherAppPlaying { playing: bool },
    FocusOutcome { outcome: FocusOutcome },
    FailNextBind { rejected: bool },
    TrackSettings {
        track_id: String,
        settings: TrackAudioSettings,
    },
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let scenario: Scenario =
            toml::from_str(content).map_err(|e| Error::Scenario(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if let Some(pair) = self.steps.windows(2).find(|w| w[1].at_ms < w[0].at_ms) {
            return Err(Error::Scenario(format!(
                "steps out of order: {} ms after {} ms",
                pair[1].at_ms, pair[0].at_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::Scenario(format!(
                "initial_volume {} outside 0.0-1.0",
                self.initial_volume
            )));
        }
        Ok(())
    }

    /// Offset of the last step plus the tail
    pub fn duration(&self) -> Duration {
        let last = self.steps.last().map(|s| s.at_ms).unwrap_or(0);
        Duration::from_millis(last + self.tail_ms)
    }
}

/// Outcome of a scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub status: ControllerStatus,
    pub engine_calls: Vec<EngineCall>,
    pub notices: Vec<FocusNotice>,
}

/// Run `scenario` to completion against a fresh simulated rig
pub async fn run_scenario(
    scenario: &Scenario,
    config: &FocusConfig,
    preferences: Arc<PreferenceHub>,
) -> Result<ScenarioReport> {
    info!("Running scenario '{}' ({} steps)", scenario.name, scenario.steps.len());

    let rig = SimulatedRig::new(config, scenario.initial_volume, bpc_common::SystemClock.epoch_ms());
    rig.engine.set_playing(scenario.initial_playing);

    let handle = FocusController::spawn(rig.parts(), config.clone(), Arc::clone(&preferences));
    let collector = tokio::spawn(collect_notices(handle.subscribe()));

    let start = Instant::now();
    for step in &scenario.steps {
        tokio::time::sleep_until(start + Duration::from_millis(step.at_ms)).await;
        debug!("t={}ms {:?}", step.at_ms, step.action);
        apply_step(&rig, &handle, &preferences, &step.action)?;
    }
    tokio::time::sleep_until(start + scenario.duration()).await;

    let status = handle.status().await?;
    handle.shutdown().await?;
    // Last sender goes with the handle; the collector then drains and ends
    drop(handle);

    let notices = match collector.await {
        Ok(notices) => notices,
        Err(e) => {
            warn!("Notice collector failed: {}", e);
            Vec::new()
        }
    };

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        status,
        engine_calls: rig.engine.calls(),
        notices,
    })
}

async fn collect_notices(mut rx: broadcast::Receiver<FocusNotice>) -> Vec<FocusNotice> {
    let mut notices = Vec::new();
    loop {
        match rx.recv().await {
            Ok(notice) => notices.push(notice),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Notice log lagged, {} notices lost", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    notices
}

fn apply_step(
    rig: &SimulatedRig,
    handle: &ControllerHandle,
    preferences: &PreferenceHub,
    action: &ScenarioAction,
) -> Result<()> {
    match action.clone() {
        ScenarioAction::Focus { signal } => handle.focus(signal)?,
        ScenarioAction::PlayWhenReady { value, reason } => {
            rig.engine.set_playing(value);
            handle.engine(EngineEvent::PlayWhenReadyChanged {
                play_when_ready: value,
                reason,
            })?;
        }
        ScenarioAction::EnginePlaying { playing } => {
            rig.engine.set_playing(playing);
            handle.engine(EngineEvent::IsPlayingChanged { playing })?;
        }
        ScenarioAction::TrackTransition { track_id, reason } => {
            handle.engine(EngineEvent::TrackTransition { track_id, reason })?
        }
        ScenarioAction::Volume { volume } => {
            rig.engine.set_volume_external(volume);
            handle.engine(EngineEvent::VolumeChanged { volume })?;
        }
        ScenarioAction::AudioSession { session_id } => {
            handle.engine(EngineEvent::AudioSessionChanged { session_id })?
        }
        ScenarioAction::PlaybackError { message } => {
            rig.engine.set_playing(false);
            handle.engine(EngineEvent::PlaybackError { message })?;
        }
        ScenarioAction::BecomingNoisy => {
            if rig.noisy_routes.subscriber_count() == 0 {
                handle.send(RouteEvent::BecomingNoisy)?;
            } else {
                rig.noisy_routes.notify_becoming_noisy();
            }
        }
        ScenarioAction::AttachOutput { kind, name } => rig.routes.attach(OutputDevice::new(kind, name)),
        ScenarioAction::DetachOutput { kind } => {
            rig.routes.detach(kind);
        }
        ScenarioAction::ClientConnected { identifier } => handle.controller_connected(identifier)?,
        ScenarioAction::UserPlay => handle.play()?,
        ScenarioAction::UserPause => handle.pause()?,
        ScenarioAction::NotificationVisible { value } => preferences.set_notification_visible(value),
        ScenarioAction::CrossfadeMs { value } => preferences.set_crossfade_ms(value),
        ScenarioAction::PauseOnNoisy { value } => preferences.set_pause_on_noisy(value),
        ScenarioAction::ResumeOnFocus { value } => preferences.set_resume_on_focus(value),
        ScenarioAction::SleepTimerIn { delay_ms } => {
            preferences.set_sleep_timer_target(rig.clock.epoch_ms() + delay_ms)
        }
        ScenarioAction::CommunicationMode { active } => rig.audio_system.set_communication_mode(active),
        ScenarioAction::OtherAppPlaying { playing } => rig.audio_system.set_other_app_playing(playing),
        ScenarioAction::FocusOutcome { outcome } => rig.audio_system.set_focus_outcome(outcome),
        ScenarioAction::FailNextBind { rejected } => rig.surface.fail_next_bind(if rejected {
            BindFailure::Rejected
        } else {
            BindFailure::Error
        }),
        ScenarioAction::TrackSettings { track_id, settings } => {
            rig.track_settings.insert(track_id, settings)
        }
    }
    Ok(())
}

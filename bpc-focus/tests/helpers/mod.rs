//! Test harness for bpc-focus integration tests
//!
//! Wires a `FocusController` to the simulated rig under a paused tokio clock:
//! - `HarnessBuilder`: tweak config, preferences, starting volume and state
//! - `Harness`: feed events, advance virtual time, read status and notices

#![allow(dead_code)]

use bpc_common::events::FocusNotice;
use bpc_focus::config::FocusConfig;
use bpc_focus::controller::{ControllerHandle, FocusController};
use bpc_focus::engine::PlaybackEngine;
use bpc_focus::events::{EngineEvent, FocusSignal, PlayChangeReason};
use bpc_focus::preferences::{MemoryPreferenceStore, PlaybackPreferences, PreferenceHub};
use bpc_focus::simulation::SimulatedRig;
use bpc_focus::state::ControllerStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Wall time the simulated clock starts at (2023-11-14T22:13:20Z)
pub const START_EPOCH_MS: i64 = 1_700_000_000_000;

pub struct HarnessBuilder {
    config: FocusConfig,
    preferences: PlaybackPreferences,
    volume: f32,
    playing: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: FocusConfig::default(),
            preferences: PlaybackPreferences::default(),
            volume: 1.0,
            playing: false,
        }
    }

    pub fn config(mut self, edit: impl FnOnce(&mut FocusConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn preferences(mut self, edit: impl FnOnce(&mut PlaybackPreferences)) -> Self {
        edit(&mut self.preferences);
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn playing(mut self) -> Self {
        self.playing = true;
        self
    }

    pub async fn start(self) -> Harness {
        let rig = SimulatedRig::new(&self.config, self.volume, START_EPOCH_MS);
        rig.engine.set_playing(self.playing);

        let store = Arc::new(MemoryPreferenceStore::new(self.preferences));
        let preferences =
            Arc::new(PreferenceHub::load(store.clone()).expect("memory store never fails"));

        let handle = FocusController::spawn(rig.parts(), self.config.clone(), Arc::clone(&preferences));
        let notices = handle.subscribe();

        let harness = Harness {
            rig,
            store,
            preferences,
            handle,
            notices,
            config: self.config,
        };
        // Let the controller apply its initial preferences
        harness.status().await;
        harness
    }
}

pub struct Harness {
    pub rig: SimulatedRig,
    pub store: Arc<MemoryPreferenceStore>,
    pub preferences: Arc<PreferenceHub>,
    pub handle: ControllerHandle,
    pub notices: broadcast::Receiver<FocusNotice>,
    pub config: FocusConfig,
}

impl Harness {
    /// Default harness with the engine playing at full volume
    pub async fn playing() -> Harness {
        HarnessBuilder::new().playing().start().await
    }

    /// Status after every queued event has been processed
    pub async fn status(&self) -> ControllerStatus {
        self.handle.status().await.expect("controller running")
    }

    /// Let forwarder tasks deliver, then wait for the queue to drain
    pub async fn flush(&self) -> ControllerStatus {
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.status().await
    }

    /// Advance virtual time by `ms`, then drain the queue
    pub async fn advance(&self, ms: u64) -> ControllerStatus {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        self.status().await
    }

    pub async fn focus(&self, signal: FocusSignal) -> ControllerStatus {
        self.handle.focus(signal).expect("controller running");
        self.status().await
    }

    pub async fn engine_event(&self, event: EngineEvent) -> ControllerStatus {
        self.handle.engine(event).expect("controller running");
        self.status().await
    }

    /// The engine paused itself for a focus loss (no OS signal seen)
    pub async fn engine_focus_pause(&self) -> ControllerStatus {
        self.rig.engine.set_playing(false);
        self.engine_event(EngineEvent::PlayWhenReadyChanged {
            play_when_ready: false,
            reason: PlayChangeReason::AudioFocusLoss,
        })
        .await
    }

    pub async fn user_pause(&self) -> ControllerStatus {
        self.handle.pause().expect("controller running");
        self.status().await
    }

    pub async fn user_play(&self) -> ControllerStatus {
        self.handle.play().expect("controller running");
        self.status().await
    }

    pub async fn becoming_noisy(&self) -> ControllerStatus {
        self.rig.noisy_routes.notify_becoming_noisy();
        self.flush().await
    }

    pub fn volume(&self) -> f32 {
        self.rig.engine.volume()
    }

    pub fn play_count(&self) -> usize {
        self.rig.engine.play_count()
    }

    pub fn pause_count(&self) -> usize {
        self.rig.engine.pause_count()
    }

    /// Every notice received so far
    pub fn drain_notices(&mut self) -> Vec<FocusNotice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }

    pub async fn shutdown(&self) {
        self.handle.shutdown().await.expect("shutdown succeeds");
    }
}

/// Count notices of one type
pub fn count_of(notices: &[FocusNotice], event_type: &str) -> usize {
    notices.iter().filter(|n| n.event_type() == event_type).count()
}

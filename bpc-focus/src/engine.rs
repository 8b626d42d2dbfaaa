//! Playback engine adapter
//!
//! Thin transport surface the controller drives. Implementations wrap the
//! real media engine; no focus logic lives here.
//!
//! `SimulatedEngine` is a recording in-memory implementation used by the
//! scenario runner and the integration tests.

use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Transport commands and queries against the underlying media engine
pub trait PlaybackEngine: Send + Sync {
    fn play(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn is_playing(&self) -> bool;

    /// True if a media item is loaded (used to decide whether a freshly bound
    /// surface needs a refresh)
    fn has_media_item(&self) -> bool;

    /// Current output volume (0.0-1.0)
    fn volume(&self) -> f32;
    fn set_volume(&self, volume: f32) -> Result<()>;
    fn set_playback_rate(&self, pitch: f32, speed: f32) -> Result<()>;
}

/// One recorded engine call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum EngineCall {
    Play,
    Pause,
    SetVolume { volume: f32 },
    SetPlaybackRate { pitch: f32, speed: f32 },
}

#[derive(Debug)]
struct SimulatedState {
    playing: bool,
    has_media: bool,
    volume: f32,
    pitch: f32,
    speed: f32,
    fail_play: bool,
    calls: Vec<EngineCall>,
}

/// In-memory engine that records every transport call
#[derive(Debug)]
pub struct SimulatedEngine {
    state: Mutex<SimulatedState>,
}

impl SimulatedEngine {
    /// Create a paused engine with a loaded item at `volume`
    pub fn new(volume: f32) -> Self {
        Self {
            state: Mutex::new(SimulatedState {
                playing: false,
                has_media: true,
                volume: volume.clamp(0.0, 1.0),
                pitch: 1.0,
                speed: 1.0,
                fail_play: false,
                calls: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimulatedState> {
        // Poisoning is ignored
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Change playing state without recording a command (external actor)
    pub fn set_playing(&self, playing: bool) {
        self.state().playing = playing;
    }

    pub fn set_has_media(&self, has_media: bool) {
        self.state().has_media = has_media;
    }

    /// Make subsequent `play()` calls fail
    pub fn set_fail_play(&self, fail: bool) {
        self.state().fail_play = fail;
    }

    /// Change volume without recording a command (external actor)
    pub fn set_volume_external(&self, volume: f32) {
        self.state().volume = volume.clamp(0.0, 1.0);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    pub fn play_count(&self) -> usize {
        self.state().calls.iter().filter(|c| **c == EngineCall::Play).count()
    }

    pub fn pause_count(&self) -> usize {
        self.state().calls.iter().filter(|c| **c == EngineCall::Pause).count()
    }

    /// Every volume written through `set_volume`, oldest first
    pub fn volume_history(&self) -> Vec<f32> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::SetVolume { volume } => Some(*volume),
                _ => None,
            })
            .collect()
    }

    pub fn playback_rate(&self) -> (f32, f32) {
        let state = self.state();
        (state.pitch, state.speed)
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn play(&self) -> Result<()> {
        let mut state = self.state();
        state.calls.push(EngineCall::Play);
        if state.fail_play {
            return Err(Error::Engine("simulated play failure".to_string()));
        }
        state.playing = true;
        debug!("Simulated engine: play");
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        let mut state = self.state();
        state.calls.push(EngineCall::Pause);
        state.playing = false;
        debug!("Simulated engine: pause");
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.state().playing
    }

    fn has_media_item(&self) -> bool {
        self.state().has_media
    }

    fn volume(&self) -> f32 {
        self.state().volume
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        let mut state = self.state();
        let volume = volume.clamp(0.0, 1.0);
        state.calls.push(EngineCall::SetVolume { volume });
        state.volume = volume;
        Ok(())
    }

    fn set_playback_rate(&self, pitch: f32, speed: f32) -> Result<()> {
        let mut state = self.state();
        state.calls.push(EngineCall::SetPlaybackRate { pitch, speed });
        state.pitch = pitch;
        state.speed = speed;
        Ok(())
    }
}

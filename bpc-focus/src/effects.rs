//! Per-track audio settings and effects lifecycle
//!
//! Tracks may carry their own equalizer, bass boost, virtualizer, loudness,
//! pitch and speed settings. The controller looks them up on every track
//! transition and applies or resets the effects chain bound to the current
//! audio session.
//!
//! Effects are created per audio session id. Every create, apply, reset and
//! release goes through `EffectsSlot`, which serializes them behind one
//! async mutex so session changes and teardown cannot race.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Stored audio settings for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackAudioSettings {
    /// Effects chain enabled for this track
    pub enabled: bool,
    /// Equalizer band gains in dB, lowest band first
    pub eq_band_gains_db: Vec<f32>,
    /// Bass boost strength (0-1000)
    pub bass_boost: u16,
    /// Virtualizer strength (0-1000)
    pub virtualizer: u16,
    /// Loudness enhancer target gain in millibels
    pub loudness_gain_mb: i32,
    pub pitch: f32,
    pub speed: f32,
}

impl Default for TrackAudioSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            eq_band_gains_db: Vec::new(),
            bass_boost: 0,
            virtualizer: 0,
            loudness_gain_mb: 0,
            pitch: 1.0,
            speed: 1.0,
        }
    }
}

impl TrackAudioSettings {
    /// Pitch and speed to apply, falling back to 1.0 for non-positive values
    pub fn playback_rate(&self) -> (f32, f32) {
        let sane = |v: f32| if v.is_finite() && v > 0.0 { v } else { 1.0 };
        (sane(self.pitch), sane(self.speed))
    }
}

/// Pitch/speed for a transition: stored values, or defaults when none exist
pub fn playback_rate_for(settings: Option<&TrackAudioSettings>) -> (f32, f32) {
    settings.map(TrackAudioSettings::playback_rate).unwrap_or((1.0, 1.0))
}

/// Lookup of stored per-track settings
pub trait TrackSettingsLookup: Send + Sync {
    /// `Ok(None)` means the track has no stored settings
    fn lookup(&self, track_id: &str) -> Result<Option<TrackAudioSettings>>;
}

/// Lookup with nothing stored
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrackSettings;

impl TrackSettingsLookup for NoTrackSettings {
    fn lookup(&self, _track_id: &str) -> Result<Option<TrackAudioSettings>> {
        Ok(None)
    }
}

/// In-memory settings table
#[derive(Debug, Default)]
pub struct MemoryTrackSettings {
    settings: RwLock<HashMap<String, TrackAudioSettings>>,
    fail: AtomicBool,
}

impl MemoryTrackSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(settings: HashMap<String, TrackAudioSettings>) -> Self {
        Self {
            settings: RwLock::new(settings),
            fail: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, track_id: impl Into<String>, settings: TrackAudioSettings) {
        self.settings
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(track_id.into(), settings);
    }

    /// Make every lookup fail (storage unavailable)
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl TrackSettingsLookup for MemoryTrackSettings {
    fn lookup(&self, track_id: &str) -> Result<Option<TrackAudioSettings>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::SettingsLookup(format!("storage unavailable for {}", track_id)));
        }
        Ok(self
            .settings
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(track_id)
            .cloned())
    }
}

/// An effects chain bound to one audio session
pub trait AudioEffects: Send {
    fn apply(&mut self, settings: &TrackAudioSettings) -> Result<()>;

    /// Return every effect to neutral
    fn reset(&mut self) -> Result<()>;

    /// Release underlying resources; the chain is unusable afterwards
    fn release(&mut self);
}

/// Creates an effects chain for an audio session
pub trait EffectsFactory: Send + Sync {
    fn create(&self, session_id: i32) -> Result<Box<dyn AudioEffects>>;
}

struct ActiveEffects {
    session_id: i32,
    effects: Box<dyn AudioEffects>,
}

impl ActiveEffects {
    /// Apply enabled settings; anything else (or a failed apply) resets
    fn apply_or_reset(&mut self, settings: Option<&TrackAudioSettings>) {
        if let Some(settings) = settings.filter(|s| s.enabled) {
            match self.effects.apply(settings) {
                Ok(()) => return,
                Err(e) => warn!("Failed to apply track audio settings: {}", e),
            }
        }
        if let Err(e) = self.effects.reset() {
            warn!("Failed to reset audio effects: {}", e);
        }
    }
}

#[derive(Default)]
struct SlotState {
    active: Option<ActiveEffects>,
    /// Settings of the current track, re-applied when the session changes
    track_settings: Option<TrackAudioSettings>,
}

/// Mutex-guarded owner of the current effects chain
pub struct EffectsSlot {
    factory: Arc<dyn EffectsFactory>,
    state: AsyncMutex<SlotState>,
}

impl EffectsSlot {
    pub fn new(factory: Arc<dyn EffectsFactory>) -> Self {
        Self {
            factory,
            state: AsyncMutex::new(SlotState::default()),
        }
    }

    /// Recreate the chain for a new session, releasing the old one first
    ///
    /// The new chain gets the current track's enabled settings. A creation
    /// failure leaves no chain bound; later applies only record settings
    /// until the next session change.
    pub async fn on_session_changed(&self, session_id: i32) {
        let mut state = self.state.lock().await;

        if let Some(active) = state.active.as_ref() {
            if active.session_id == session_id {
                debug!("Audio session {} unchanged, keeping effects", session_id);
                return;
            }
        }

        if let Some(mut old) = state.active.take() {
            old.effects.release();
            debug!("Released effects for session {}", old.session_id);
        }

        match self.factory.create(session_id) {
            Ok(effects) => {
                info!("Audio effects bound to session {}", session_id);
                let mut active = ActiveEffects {
                    session_id,
                    effects,
                };
                // A fresh chain is already neutral
                if state.track_settings.as_ref().is_some_and(|s| s.enabled) {
                    active.apply_or_reset(state.track_settings.as_ref());
                }
                state.active = Some(active);
            }
            Err(e) => warn!("Failed to create audio effects for session {}: {}", session_id, e),
        }
    }

    /// Apply stored settings, or reset to neutral when there are none
    pub async fn apply(&self, settings: Option<&TrackAudioSettings>) {
        let mut state = self.state.lock().await;
        state.track_settings = settings.cloned();

        match state.active.as_mut() {
            Some(active) => active.apply_or_reset(settings),
            None => debug!("No effects chain bound, skipping track settings"),
        }
    }

    pub async fn release(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut active) = state.active.take() {
            active.effects.release();
            info!("Released audio effects for session {}", active.session_id);
        }
    }

    pub async fn session_id(&self) -> Option<i32> {
        self.state.lock().await.active.as_ref().map(|a| a.session_id)
    }
}

/// One recorded effects operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EffectsCall {
    Create { session_id: i32 },
    Apply { session_id: i32, settings: TrackAudioSettings },
    Reset { session_id: i32 },
    Release { session_id: i32 },
}

/// Factory producing effects chains that only record what happened to them
#[derive(Debug, Default, Clone)]
pub struct RecordingEffectsFactory {
    log: Arc<Mutex<Vec<EffectsCall>>>,
    fail_create: Arc<AtomicBool>,
    fail_apply: Arc<AtomicBool>,
}

impl RecordingEffectsFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<EffectsCall>> {
        self.log.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn calls(&self) -> Vec<EffectsCall> {
        self.log().clone()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_apply(&self, fail: bool) {
        self.fail_apply.store(fail, Ordering::SeqCst);
    }
}

impl EffectsFactory for RecordingEffectsFactory {
    fn create(&self, session_id: i32) -> Result<Box<dyn AudioEffects>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Effects(format!("session {} unavailable", session_id)));
        }
        self.log().push(EffectsCall::Create { session_id });
        Ok(Box::new(RecordingEffects {
            session_id,
            factory: self.clone(),
        }))
    }
}

struct RecordingEffects {
    session_id: i32,
    factory: RecordingEffectsFactory,
}

impl AudioEffects for RecordingEffects {
    fn apply(&mut self, settings: &TrackAudioSettings) -> Result<()> {
        if self.factory.fail_apply.load(Ordering::SeqCst) {
            return Err(Error::Effects("equalizer rejected band levels".to_string()));
        }
        self.factory.log().push(EffectsCall::Apply {
            session_id: self.session_id,
            settings: settings.clone(),
        });
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.factory.log().push(EffectsCall::Reset {
            session_id: self.session_id,
        });
        Ok(())
    }

    fn release(&mut self) {
        self.factory.log().push(EffectsCall::Release {
            session_id: self.session_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boosted() -> TrackAudioSettings {
        TrackAudioSettings {
            enabled: true,
            eq_band_gains_db: vec![3.0, 0.0, -2.0, 0.0, 4.0],
            bass_boost: 600,
            ..Default::default()
        }
    }

    #[test]
    fn test_playback_rate_defaults() {
        assert_eq!(playback_rate_for(None), (1.0, 1.0));

        let settings = TrackAudioSettings {
            pitch: 1.1,
            speed: 0.0,
            ..Default::default()
        };
        assert_eq!(playback_rate_for(Some(&settings)), (1.1, 1.0));
    }

    #[test]
    fn test_memory_lookup_and_failure() {
        let lookup = MemoryTrackSettings::new();
        lookup.insert("track-1", boosted());

        assert_eq!(lookup.lookup("track-1").unwrap(), Some(boosted()));
        assert_eq!(lookup.lookup("track-2").unwrap(), None);

        lookup.set_fail(true);
        assert!(matches!(lookup.lookup("track-1"), Err(Error::SettingsLookup(_))));
    }

    #[tokio::test]
    async fn test_session_change_releases_previous_chain() {
        let factory = RecordingEffectsFactory::new();
        let slot = EffectsSlot::new(Arc::new(factory.clone()));

        slot.on_session_changed(7).await;
        slot.on_session_changed(7).await;
        slot.on_session_changed(9).await;

        assert_eq!(slot.session_id().await, Some(9));
        assert_eq!(
            factory.calls(),
            vec![
                EffectsCall::Create { session_id: 7 },
                EffectsCall::Release { session_id: 7 },
                EffectsCall::Create { session_id: 9 },
            ]
        );
    }

    #[tokio::test]
    async fn test_apply_or_reset() {
        let factory = RecordingEffectsFactory::new();
        let slot = EffectsSlot::new(Arc::new(factory.clone()));

        // No chain yet: only remembered
        slot.apply(None).await;
        assert!(factory.calls().is_empty());

        slot.on_session_changed(3).await;
        slot.apply(Some(&boosted())).await;
        slot.apply(None).await;
        slot.apply(Some(&TrackAudioSettings::default())).await;

        assert_eq!(
            factory.calls()[1..],
            [
                EffectsCall::Apply {
                    session_id: 3,
                    settings: boosted()
                },
                EffectsCall::Reset { session_id: 3 },
                EffectsCall::Reset { session_id: 3 },
            ]
        );
    }

    #[tokio::test]
    async fn test_new_session_reapplies_current_track() {
        let factory = RecordingEffectsFactory::new();
        let slot = EffectsSlot::new(Arc::new(factory.clone()));

        // Settings arrive before any session exists
        slot.apply(Some(&boosted())).await;
        slot.on_session_changed(4).await;
        slot.on_session_changed(8).await;

        assert_eq!(
            factory.calls(),
            vec![
                EffectsCall::Create { session_id: 4 },
                EffectsCall::Apply {
                    session_id: 4,
                    settings: boosted()
                },
                EffectsCall::Release { session_id: 4 },
                EffectsCall::Create { session_id: 8 },
                EffectsCall::Apply {
                    session_id: 8,
                    settings: boosted()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_new_session_after_plain_track_stays_neutral() {
        let factory = RecordingEffectsFactory::new();
        let slot = EffectsSlot::new(Arc::new(factory.clone()));
        slot.on_session_changed(1).await;
        slot.apply(Some(&boosted())).await;
        slot.apply(None).await;

        slot.on_session_changed(2).await;

        assert_eq!(factory.calls().last(), Some(&EffectsCall::Create { session_id: 2 }));
    }

    #[tokio::test]
    async fn test_failed_apply_falls_back_to_reset() {
        let factory = RecordingEffectsFactory::new();
        let slot = EffectsSlot::new(Arc::new(factory.clone()));
        slot.on_session_changed(1).await;
        factory.set_fail_apply(true);

        slot.apply(Some(&boosted())).await;
        assert_eq!(factory.calls().last(), Some(&EffectsCall::Reset { session_id: 1 }));
    }

    #[tokio::test]
    async fn test_failed_create_leaves_slot_empty() {
        let factory = RecordingEffectsFactory::new();
        factory.set_fail_create(true);
        let slot = EffectsSlot::new(Arc::new(factory.clone()));

        slot.on_session_changed(5).await;
        assert_eq!(slot.session_id().await, None);

        slot.release().await;
        assert!(factory.calls().is_empty());
    }
}

//! Fully simulated collaborator set
//!
//! Wires every controller dependency to its recording in-memory
//! implementation. Used by the scenario runner and by integration tests.

use crate::audio_system::SimulatedAudioSystem;
use crate::config::FocusConfig;
use crate::controller::ControllerParts;
use crate::effects::{EffectsSlot, MemoryTrackSettings, RecordingEffectsFactory};
use crate::engine::SimulatedEngine;
use crate::notification::RecordingSurface;
use crate::remote::{ClientClassifier, ControllerTrackers};
use crate::route::{NoisyRouteSource, SharedRoutes};
use bpc_common::{AnchoredClock, Clock};
use std::sync::Arc;

/// Simulated devices and platform services
pub struct SimulatedRig {
    pub engine: Arc<SimulatedEngine>,
    pub audio_system: Arc<SimulatedAudioSystem>,
    pub routes: Arc<SharedRoutes>,
    pub noisy_routes: Arc<NoisyRouteSource>,
    pub trackers: Arc<ControllerTrackers>,
    pub surface: Arc<RecordingSurface>,
    pub track_settings: Arc<MemoryTrackSettings>,
    pub effects_factory: RecordingEffectsFactory,
    pub effects: Arc<EffectsSlot>,
    pub clock: Arc<AnchoredClock>,
}

impl SimulatedRig {
    /// Rig with a paused engine at `volume` and wall time anchored at `epoch_ms`
    pub fn new(config: &FocusConfig, volume: f32, epoch_ms: i64) -> Self {
        let clock = Arc::new(AnchoredClock::starting_at(epoch_ms));
        let classifier =
            ClientClassifier::new(&config.automotive_client_patterns, &config.local_client_ids);
        let trackers = Arc::new(ControllerTrackers::new(
            Arc::clone(&clock) as Arc<dyn Clock>,
            classifier,
        ));
        let effects_factory = RecordingEffectsFactory::new();
        let effects = Arc::new(EffectsSlot::new(Arc::new(effects_factory.clone())));

        Self {
            engine: Arc::new(SimulatedEngine::new(volume)),
            audio_system: Arc::new(SimulatedAudioSystem::new()),
            routes: Arc::new(SharedRoutes::new()),
            noisy_routes: Arc::new(NoisyRouteSource::default()),
            trackers,
            surface: Arc::new(RecordingSurface::new()),
            track_settings: Arc::new(MemoryTrackSettings::new()),
            effects_factory,
            effects,
            clock,
        }
    }

    pub fn parts(&self) -> ControllerParts {
        ControllerParts {
            engine: self.engine.clone(),
            audio_system: self.audio_system.clone(),
            routes: self.routes.clone(),
            noisy_routes: Some(Arc::clone(&self.noisy_routes)),
            trackers: Arc::clone(&self.trackers),
            surface: self.surface.clone(),
            track_settings: self.track_settings.clone(),
            effects: Arc::clone(&self.effects),
            clock: self.clock.clone(),
        }
    }
}

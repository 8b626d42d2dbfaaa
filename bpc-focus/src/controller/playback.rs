//! Engine callbacks and transport
//!
//! **Responsibilities:**
//! - Play/pause-with-reason callbacks and explicit user commands
//! - Track transitions: per-track rate and effects, crossfade ramps
//! - Volume, audio session and playback error callbacks

use super::core::FocusController;
use crate::crossfade::RampStep;
use crate::effects::{playback_rate_for, TrackAudioSettings};
use crate::events::{
    EngineEvent, FocusNotice, PauseReason, PlayChangeReason, TransitionReason, UserCommand,
};
use crate::scheduler::TaskKey;
use bpc_common::events::TransportAction;
use tracing::{debug, error, info, warn};

impl FocusController {
    pub(super) async fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::PlayWhenReadyChanged {
                play_when_ready,
                reason,
            } => self.on_play_when_ready(play_when_ready, reason),
            EngineEvent::IsPlayingChanged { playing } => {
                if playing {
                    self.last_engine_start = Some(self.clock.now());
                }
            }
            EngineEvent::TrackTransition { track_id, reason } => {
                self.on_track_transition(track_id, reason).await
            }
            EngineEvent::VolumeChanged { volume } => {
                // Our own duck and ramp writes echo back here; only listener changes count
                if !self.state.duck.is_ducked && !self.crossfade.is_active() {
                    self.state.target_volume = volume;
                    self.state.duck.normal_volume = volume;
                }
            }
            EngineEvent::AudioSessionChanged { session_id } => {
                self.effects.on_session_changed(session_id).await;
            }
            EngineEvent::PlaybackError { message } => {
                error!("Playback error: {}", message);
                self.finish_crossfade();
            }
        }
    }

    fn on_play_when_ready(&mut self, play_when_ready: bool, reason: PlayChangeReason) {
        match reason {
            PlayChangeReason::UserRequest | PlayChangeReason::Remote => {
                // The engine does not say which client sent it, so only the
                // generic tracker is stamped
                if reason == PlayChangeReason::Remote {
                    self.trackers.external.mark_activity();
                }
                if play_when_ready {
                    self.set_pause_reason(PauseReason::None);
                } else {
                    self.finish_crossfade();
                    self.set_pause_reason(PauseReason::UserPause);
                    self.cancel_pending_resumes();
                }
                self.state.was_playing_before_loss = false;
            }
            PlayChangeReason::AudioFocusLoss => {
                if play_when_ready {
                    // Engine resumed on its own after focus returned
                    if !self.state.pause_reason.blocks_auto_resume() {
                        self.set_pause_reason(PauseReason::None);
                        self.state.was_playing_before_loss = false;
                        self.cancel_recoveries();
                    }
                } else {
                    self.on_engine_focus_pause();
                }
            }
            PlayChangeReason::Other => {
                debug!("Play-when-ready {} (other)", play_when_ready);
            }
        }
    }

    pub(super) fn on_user_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::Play => {
                match self.audio_system.request_focus() {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!("Audio focus denied, not starting playback");
                        return;
                    }
                    // Listener asked explicitly; play without confirmed focus
                    Err(e) => warn!("Focus request failed, playing anyway: {}", e),
                }
                if self.start_engine("user") {
                    self.set_pause_reason(PauseReason::None);
                    self.state.was_playing_before_loss = false;
                    self.cancel_pending_resumes();
                }
            }
            UserCommand::Pause => {
                self.pause_engine("user");
                self.set_pause_reason(PauseReason::UserPause);
                self.state.was_playing_before_loss = false;
                self.cancel_pending_resumes();
            }
        }
    }

    /// Recoveries and pending route checks become moot after explicit intent
    pub(super) fn cancel_pending_resumes(&mut self) {
        self.cancel_recoveries();
        self.scheduler.cancel(TaskKey::RouteSettle);
    }

    /// Play through the engine; false if it refused
    pub(super) fn start_engine(&mut self, cause: &str) -> bool {
        match self.engine.play() {
            Ok(()) => {
                self.emit_transport(TransportAction::Play, cause);
                true
            }
            Err(e) => {
                warn!("play() failed ({}): {}", cause, e);
                false
            }
        }
    }

    /// Pause through the engine; false if it refused
    pub(super) fn pause_engine(&mut self, cause: &str) -> bool {
        self.finish_crossfade();
        match self.engine.pause() {
            Ok(()) => {
                self.emit_transport(TransportAction::Pause, cause);
                true
            }
            Err(e) => {
                warn!("pause() failed ({}): {}", cause, e);
                false
            }
        }
    }

    /// Volume the engine should sit at outside a ramp
    pub(super) fn output_volume(&self) -> f32 {
        if self.state.duck.is_ducked {
            self.state.duck.normal_volume.min(self.config.duck_volume)
        } else {
            self.state.target_volume
        }
    }

    /// Abandon a running ramp without touching the volume; true if one ran
    pub(super) fn stop_crossfade(&mut self) -> bool {
        self.scheduler.cancel(TaskKey::CrossfadeStep);
        self.crossfade.cancel()
    }

    /// Abandon a running ramp and jump to the output volume
    pub(super) fn finish_crossfade(&mut self) {
        if self.stop_crossfade() {
            let volume = self.output_volume();
            debug!("Crossfade interrupted, volume set to {:.2}", volume);
            if let Err(e) = self.engine.set_volume(volume) {
                warn!("Failed to restore volume after crossfade: {}", e);
            }
        }
    }

    async fn on_track_transition(&mut self, track_id: Option<String>, reason: TransitionReason) {
        debug!("Track transition to {:?} ({:?})", track_id, reason);

        let settings = track_id.as_deref().and_then(|id| self.lookup_track_settings(id));
        let (pitch, speed) = playback_rate_for(settings.as_ref());
        if let Err(e) = self.engine.set_playback_rate(pitch, speed) {
            warn!("Failed to set playback rate: {}", e);
        }
        self.effects.apply(settings.as_ref()).await;

        if self.crossfade.should_ramp(reason) && self.engine.is_playing() {
            self.stop_crossfade();
            let start = self.crossfade.begin(self.clock.now(), track_id.clone());
            if let Err(e) = self.engine.set_volume(start) {
                warn!("Failed to start crossfade ramp: {}", e);
            }
            self.scheduler
                .schedule(TaskKey::CrossfadeStep, self.crossfade.step_interval());

            let duration_ms = self.crossfade.duration().as_millis() as u64;
            info!(
                "Crossfading into {:?} over {} ms ({})",
                track_id, duration_ms, self.config.crossfade_curve
            );
            self.notices.emit_lossy(FocusNotice::CrossfadeStarted {
                track_id,
                duration_ms,
                timestamp: bpc_common::time::now(),
            });
        } else {
            // Explicit jump during a ramp lands on the full volume
            self.finish_crossfade();
        }
    }

    fn lookup_track_settings(&self, track_id: &str) -> Option<TrackAudioSettings> {
        match self.track_settings.lookup(track_id) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Track settings lookup for {} failed, using defaults: {}", track_id, e);
                None
            }
        }
    }

    pub(super) fn on_crossfade_step(&mut self) {
        let target = self.output_volume();
        let track_id = self.crossfade.track_id().map(str::to_string);

        match self.crossfade.step(self.clock.now(), target) {
            Some(RampStep::Continue(volume)) => {
                if let Err(e) = self.engine.set_volume(volume) {
                    warn!("Crossfade step failed: {}", e);
                }
                self.scheduler
                    .schedule(TaskKey::CrossfadeStep, self.crossfade.step_interval());
            }
            Some(RampStep::Finished(volume)) => {
                if let Err(e) = self.engine.set_volume(volume) {
                    warn!("Crossfade final step failed: {}", e);
                }
                debug!("Crossfade complete at {:.2}", volume);
                self.notices.emit_lossy(FocusNotice::CrossfadeCompleted {
                    track_id,
                    timestamp: bpc_common::time::now(),
                });
            }
            None => {}
        }
    }
}

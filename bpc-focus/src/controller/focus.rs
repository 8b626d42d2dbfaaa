//! Focus signal handling and recovery
//!
//! **Responsibilities:**
//! - Pause-reason transitions for OS focus signals
//! - Ducking and exact volume restore
//! - Resume test on focus gain
//! - Engine-reported focus pauses (classified by `policy`)
//! - Scheduling, eligibility and firing of delayed recoveries

use super::core::FocusController;
use crate::events::{FocusNotice, FocusSignal, PauseReason, RecoveryCategory};
use crate::policy::{self, FocusLossContext};
use crate::recovery::{check_eligibility, RecoveryContext};
use crate::scheduler::TaskKey;
use crate::state::DuckState;
use bpc_common::events::{SuppressionReason, TransportAction};
use bpc_common::time::is_within;
use tracing::{debug, info, warn};

const ALL_RECOVERIES: [RecoveryCategory; 3] = [
    RecoveryCategory::ForcedPermanent,
    RecoveryCategory::Transient,
    RecoveryCategory::PostRecoveryRetry,
];

impl FocusController {
    pub(super) fn on_focus_signal(&mut self, signal: FocusSignal) {
        debug!("Focus signal: {:?}", signal);
        self.state.last_signal = Some(signal);

        match signal {
            FocusSignal::Gain => self.on_focus_gain(),
            FocusSignal::LossTransientCanDuck => self.duck(),
            FocusSignal::LossTransient => self.on_focus_loss(PauseReason::FocusLossTransient),
            FocusSignal::LossPermanent => self.on_focus_loss(PauseReason::FocusLossPermanent),
        }
    }

    fn on_focus_loss(&mut self, reason: PauseReason) {
        let playing = self.engine.is_playing();

        // A loss arriving while already paused by the listener or a route
        // removal must not replace that pause with a resumable one
        if !playing && self.state.pause_reason.blocks_auto_resume() {
            info!(
                "Focus loss while paused ({}), keeping pause reason",
                self.state.pause_reason
            );
            return;
        }

        let already_lost = matches!(
            self.state.pause_reason,
            PauseReason::FocusLossTransient | PauseReason::FocusLossPermanent
        );
        self.state.was_playing_before_loss =
            playing || (already_lost && self.state.was_playing_before_loss);

        if playing {
            self.pause_engine("focus_loss");
        }
        self.set_pause_reason(reason);

        if self.state.was_playing_before_loss {
            self.schedule_recovery_for(reason);
        }
    }

    fn on_focus_gain(&mut self) {
        self.restore_duck();
        self.cancel_recoveries();

        if self.should_resume_on_gain() {
            info!("Focus regained, resuming after {}", self.state.pause_reason);
            if self.start_engine("focus_gain") {
                self.set_pause_reason(PauseReason::None);
                self.state.was_playing_before_loss = false;
            }
        }
    }

    fn should_resume_on_gain(&self) -> bool {
        if self.engine.is_playing() {
            return false;
        }
        match self.state.pause_reason {
            PauseReason::FocusLossTransient => self.state.was_playing_before_loss,
            // An idle player that lost focus has nothing to resume
            PauseReason::FocusLossPermanent => {
                self.state.was_playing_before_loss
                    && (self.prefs.resume_on_focus || self.remote_recently_active())
            }
            PauseReason::None | PauseReason::UserPause | PauseReason::BecomingNoisy => false,
        }
    }

    fn duck(&mut self) {
        if self.state.duck.is_ducked {
            debug!("Already ducked");
            return;
        }
        if !self.engine.is_playing() {
            debug!("Not playing, ignoring duck request");
            return;
        }

        // Mid-ramp the engine volume is not the listener's volume
        let normal_volume = if self.stop_crossfade() {
            self.state.target_volume
        } else {
            self.engine.volume()
        };
        let duck_volume = normal_volume.min(self.config.duck_volume);

        self.state.target_volume = normal_volume;
        self.state.duck = DuckState {
            is_ducked: true,
            normal_volume,
        };
        if let Err(e) = self.engine.set_volume(duck_volume) {
            warn!("Failed to lower volume for duck: {}", e);
        }

        info!("Ducked {:.2} -> {:.2}", normal_volume, duck_volume);
        self.notices.emit_lossy(FocusNotice::Ducked {
            normal_volume,
            duck_volume,
            timestamp: bpc_common::time::now(),
        });
    }

    fn restore_duck(&mut self) {
        if !self.state.duck.is_ducked {
            return;
        }
        let volume = self.state.duck.normal_volume;
        self.state.duck.is_ducked = false;

        // An active ramp picks up the restored target on its next step
        if !self.crossfade.is_active() {
            if let Err(e) = self.engine.set_volume(volume) {
                warn!("Failed to restore volume after duck: {}", e);
            }
        }

        info!("Duck ended, volume restored to {:.2}", volume);
        self.notices.emit_lossy(FocusNotice::DuckRestored {
            volume,
            timestamp: bpc_common::time::now(),
        });
    }

    /// Engine paused itself for a focus loss the controller may not have seen
    pub(super) fn on_engine_focus_pause(&mut self) {
        if self.state.pause_reason.blocks_auto_resume() {
            debug!("Engine focus pause while {}, ignoring", self.state.pause_reason);
            return;
        }

        let now = self.clock.now();
        let ctx = FocusLossContext {
            last_signal: self.state.last_signal,
            was_playing_before_loss: true,
            remote_recently_active: self.remote_recently_active(),
            recently_started: is_within(
                now,
                Some(self.started_at),
                self.config.engine_start_window(),
            ),
        };
        let reason = policy::resolve_engine_focus_pause(&ctx);
        debug!("Engine focus pause classified as {} from {:?}", reason, ctx);

        self.finish_crossfade();
        self.state.was_playing_before_loss = true;
        self.set_pause_reason(reason);
        self.schedule_recovery_for(reason);
    }

    pub(super) fn remote_recently_active(&self) -> bool {
        self.trackers
            .remote
            .is_recently_active(self.config.remote_controller_window())
    }

    pub(super) fn schedule_recovery_for(&mut self, reason: PauseReason) {
        let (category, superseded, delay) = match reason {
            PauseReason::FocusLossPermanent => (
                RecoveryCategory::ForcedPermanent,
                RecoveryCategory::Transient,
                self.config.forced_recovery_delay(),
            ),
            PauseReason::FocusLossTransient => (
                RecoveryCategory::Transient,
                RecoveryCategory::ForcedPermanent,
                self.config.transient_recovery_delay(),
            ),
            _ => return,
        };

        self.scheduler.cancel(TaskKey::Recovery(superseded));
        self.scheduler.schedule(TaskKey::Recovery(category), delay);

        debug!("Scheduled {} recovery check in {:?}", category, delay);
        self.notices.emit_lossy(FocusNotice::RecoveryScheduled {
            category,
            delay_ms: delay.as_millis() as u64,
            timestamp: bpc_common::time::now(),
        });
    }

    pub(super) fn cancel_recoveries(&mut self) {
        for category in ALL_RECOVERIES {
            if self.scheduler.cancel(TaskKey::Recovery(category)) {
                debug!("Cancelled pending {} recovery", category);
            }
        }
    }

    /// Recovery check expired: evaluate eligibility against current state
    pub(super) fn attempt_recovery(&mut self, category: RecoveryCategory) {
        let now = self.clock.now();
        let ctx = RecoveryContext {
            category,
            now,
            pause_reason: self.state.pause_reason,
            engine_playing: self.engine.is_playing(),
            communication_mode: self.audio_system.is_communication_mode(),
            other_app_playing: self.audio_system.is_other_app_playing(),
            remote_recently_active: self.remote_recently_active(),
            engine_recently_started: is_within(
                now,
                self.last_engine_start,
                self.config.engine_start_window(),
            ),
        };

        if let Err(reason) =
            check_eligibility(&ctx, &self.cooldowns, self.config.post_recovery_window())
        {
            self.suppress_recovery(category, reason);
            return;
        }

        match self.audio_system.request_focus() {
            Ok(true) => {}
            Ok(false) => {
                self.suppress_recovery(category, SuppressionReason::FocusDenied);
                return;
            }
            Err(e) => {
                warn!("Focus request for {} recovery failed: {}", category, e);
                self.suppress_recovery(category, SuppressionReason::FocusRequestFailed);
                return;
            }
        }

        self.cooldowns.stamp(category, now);

        match self.engine.play() {
            Ok(()) => {
                info!("{} recovery resumed playback", category);
                self.emit_transport(TransportAction::Play, "recovery");
                self.set_pause_reason(PauseReason::None);
                self.state.was_playing_before_loss = false;
                self.notices.emit_lossy(FocusNotice::RecoveryFired {
                    category,
                    timestamp: bpc_common::time::now(),
                });
            }
            Err(e) => warn!("{} recovery could not start playback: {}", category, e),
        }

        // Confirm the primary took effect; the retry never schedules another
        if category != RecoveryCategory::PostRecoveryRetry {
            self.scheduler.schedule(
                TaskKey::Recovery(RecoveryCategory::PostRecoveryRetry),
                self.config.post_recovery_confirm(),
            );
        }
    }

    fn suppress_recovery(&self, category: RecoveryCategory, reason: SuppressionReason) {
        if reason == SuppressionReason::AlreadyPlaying {
            debug!("{} recovery not needed, already playing", category);
        } else {
            info!("{} recovery suppressed: {:?}", category, reason);
        }
        self.notices.emit_lossy(FocusNotice::RecoverySuppressed {
            category,
            reason,
            timestamp: bpc_common::time::now(),
        });
    }
}

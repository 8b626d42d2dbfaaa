//! Preference-driven behavior
//!
//! **Responsibilities:**
//! - Apply preference changes in queue order
//! - Notification gate binding
//! - Sleep timer arming, firing and clearing

use super::core::FocusController;
use crate::events::{FocusNotice, PauseReason, PreferenceEvent};
use crate::scheduler::TaskKey;
use crate::sleep_timer::{SleepTimerCheck, SleepTimerPlan};
use std::time::Duration;
use tracing::{debug, info, warn};

impl FocusController {
    /// Values present before the controller subscribed
    pub(super) fn apply_initial_preferences(&mut self) {
        let prefs = self.prefs.clone();
        self.apply_notification_visibility(prefs.notification_visible);
        self.plan_sleep_timer(prefs.sleep_timer_target_ms);
    }

    pub(super) fn on_preference(&mut self, event: PreferenceEvent) {
        debug!("Preference update: {:?}", event);
        match event {
            PreferenceEvent::NotificationVisible(visible) => {
                self.prefs.notification_visible = visible;
                self.apply_notification_visibility(visible);
            }
            PreferenceEvent::CrossfadeMs(ms) => {
                self.prefs.crossfade_ms = ms;
                self.crossfade.set_duration(Duration::from_millis(ms));
            }
            PreferenceEvent::PauseOnNoisy(enabled) => {
                self.prefs.pause_on_noisy = enabled;
                if !enabled {
                    self.scheduler.cancel(TaskKey::RouteSettle);
                }
            }
            PreferenceEvent::ResumeOnFocus(enabled) => self.prefs.resume_on_focus = enabled,
            PreferenceEvent::SleepTimerTarget(target_ms) => {
                if target_ms == self.sleep_timer.target_ms() && self.sleep_timer.is_armed() {
                    debug!("Sleep timer target unchanged");
                    return;
                }
                self.prefs.sleep_timer_target_ms = target_ms;
                self.plan_sleep_timer(target_ms);
            }
        }
    }

    fn apply_notification_visibility(&mut self, visible: bool) {
        let has_content = self.engine.has_media_item();
        let outcome = self.notification.apply(visible, has_content);
        self.emit_gate_outcome(outcome);
    }

    fn plan_sleep_timer(&mut self, target_ms: i64) {
        self.scheduler.cancel(TaskKey::SleepTimer);

        match self.sleep_timer.plan(target_ms, self.clock.epoch_ms()) {
            SleepTimerPlan::Disabled => debug!("Sleep timer disabled"),
            SleepTimerPlan::Stale => {
                info!("Sleep timer target {} already passed, clearing", target_ms);
                self.clear_sleep_timer(target_ms, true);
            }
            SleepTimerPlan::Armed { delay } => {
                info!("Sleep timer armed, pausing in {:?}", delay);
                self.scheduler.schedule(TaskKey::SleepTimer, delay);
                self.notices.emit_lossy(FocusNotice::SleepTimerScheduled {
                    target_ms,
                    timestamp: bpc_common::time::now(),
                });
            }
        }
    }

    pub(super) fn on_sleep_timer_due(&mut self) {
        // `check` disarms on Due, so read the target first
        let fired_target = self.sleep_timer.target_ms();
        match self.sleep_timer.check(self.clock.epoch_ms()) {
            SleepTimerCheck::Disabled => debug!("Sleep timer expiry with nothing armed"),
            SleepTimerCheck::NotYet { remaining } => {
                debug!("Sleep timer woke early, {:?} remaining", remaining);
                self.scheduler.schedule(TaskKey::SleepTimer, remaining);
            }
            SleepTimerCheck::Due => {
                let paused = if self.engine.is_playing() {
                    let paused = self.pause_engine("sleep_timer");
                    if paused {
                        // Listener-equivalent pause: no focus gain may undo it
                        self.set_pause_reason(PauseReason::UserPause);
                        self.state.was_playing_before_loss = false;
                        self.cancel_pending_resumes();
                    } else {
                        warn!("Sleep timer could not pause playback");
                    }
                    paused
                } else {
                    if self.resume_pending() {
                        // Already paused by a focus loss; the listener's stop wins
                        info!(
                            "Sleep timer fired during {}, dropping resume",
                            self.state.pause_reason
                        );
                        self.set_pause_reason(PauseReason::UserPause);
                        self.state.was_playing_before_loss = false;
                        self.cancel_pending_resumes();
                    }
                    false
                };

                info!("Sleep timer fired (paused: {})", paused);
                self.notices.emit_lossy(FocusNotice::SleepTimerFired {
                    paused,
                    timestamp: bpc_common::time::now(),
                });
                self.clear_sleep_timer(fired_target, false);
            }
        }
    }

    /// Paused by a focus loss that a gain or recovery would undo
    fn resume_pending(&self) -> bool {
        let focus_loss = matches!(
            self.state.pause_reason,
            PauseReason::FocusLossTransient | PauseReason::FocusLossPermanent
        );
        focus_loss && self.state.was_playing_before_loss
    }

    /// Disarm and write 0 through the hub (and its store)
    ///
    /// The hub is only cleared while it still holds `target_ms`; a newer
    /// target set in the meantime arrives as its own preference event.
    fn clear_sleep_timer(&mut self, target_ms: i64, stale: bool) {
        self.sleep_timer.clear();
        self.prefs.sleep_timer_target_ms = 0;
        if !self.preferences.clear_sleep_timer_if(target_ms) {
            debug!("Sleep timer target replaced before clearing, keeping it");
        }
        self.notices.emit_lossy(FocusNotice::SleepTimerCleared {
            stale,
            timestamp: bpc_common::time::now(),
        });
    }
}

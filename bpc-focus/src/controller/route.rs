//! Noisy-route handling
//!
//! A route-removal broadcast is acted on only after a settle delay, and only
//! if it still looks like a real disconnection at that point. A connected car
//! head unit or a surviving external output means the route was handed off.

use super::core::FocusController;
use crate::events::{FocusNotice, PauseReason};
use crate::scheduler::TaskKey;
use bpc_common::events::NoisyIgnoredReason;
use tracing::{debug, info};

impl FocusController {
    pub(super) fn on_becoming_noisy(&mut self) {
        if !self.prefs.pause_on_noisy {
            self.ignore_noisy(NoisyIgnoredReason::PreferenceDisabled);
            return;
        }
        if !self.engine.is_playing() {
            self.ignore_noisy(NoisyIgnoredReason::NotPlaying);
            return;
        }
        if self.remote_recently_active() {
            self.ignore_noisy(NoisyIgnoredReason::RemoteControllerActive);
            return;
        }

        debug!("Output becoming noisy, re-checking in {:?}", self.config.route_settle());
        self.scheduler
            .schedule(TaskKey::RouteSettle, self.config.route_settle());
    }

    pub(super) fn on_route_settled(&mut self) {
        // Every condition is re-read; nothing captured at schedule time is trusted
        let ignored = if !self.prefs.pause_on_noisy {
            Some(NoisyIgnoredReason::PreferenceDisabled)
        } else if self.remote_recently_active() {
            Some(NoisyIgnoredReason::RemoteControllerActive)
        } else if self.routes.has_external_output() {
            Some(NoisyIgnoredReason::ExternalOutputPresent)
        } else if !self.engine.is_playing() {
            Some(NoisyIgnoredReason::NotPlaying)
        } else {
            None
        };

        if let Some(reason) = ignored {
            self.ignore_noisy(reason);
            return;
        }

        info!("Output disconnected, pausing");
        if self.pause_engine("becoming_noisy") {
            self.set_pause_reason(PauseReason::BecomingNoisy);
            self.state.was_playing_before_loss = false;
            self.cancel_recoveries();
        }
    }

    fn ignore_noisy(&self, reason: NoisyIgnoredReason) {
        info!("Ignoring noisy-route event: {:?}", reason);
        self.notices.emit_lossy(FocusNotice::NoisyRouteIgnored {
            reason,
            timestamp: bpc_common::time::now(),
        });
    }
}

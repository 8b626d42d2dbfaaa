//! Recovery cooldowns and eligibility
//!
//! Recovery is the controller resuming playback on its own when the platform
//! never delivers a clean focus gain. Each category tracks when it last fired
//! and refuses to fire again inside its cooldown window. Eligibility is always
//! evaluated at expiry time, never at scheduling time.

use crate::config::CooldownConfig;
use crate::events::{PauseReason, RecoveryCategory};
use bpc_common::events::SuppressionReason;
use bpc_common::time::is_within;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Last-fired stamps per recovery category
#[derive(Debug, Clone)]
pub struct Cooldowns {
    forced_permanent: Duration,
    transient: Duration,
    post_recovery_retry: Duration,
    last_fired: HashMap<RecoveryCategory, Instant>,
}

impl Cooldowns {
    pub fn new(config: &CooldownConfig) -> Self {
        Self {
            forced_permanent: Duration::from_millis(config.forced_permanent_ms),
            transient: Duration::from_millis(config.transient_ms),
            post_recovery_retry: Duration::from_millis(config.post_recovery_retry_ms),
            last_fired: HashMap::new(),
        }
    }

    pub fn window(&self, category: RecoveryCategory) -> Duration {
        match category {
            RecoveryCategory::ForcedPermanent => self.forced_permanent,
            RecoveryCategory::Transient => self.transient,
            RecoveryCategory::PostRecoveryRetry => self.post_recovery_retry,
        }
    }

    /// The category never fired, or its window has fully elapsed
    pub fn has_elapsed(&self, category: RecoveryCategory, now: Instant) -> bool {
        !is_within(now, self.last_fired(category), self.window(category))
    }

    pub fn stamp(&mut self, category: RecoveryCategory, now: Instant) {
        self.last_fired.insert(category, now);
    }

    pub fn last_fired(&self, category: RecoveryCategory) -> Option<Instant> {
        self.last_fired.get(&category).copied()
    }

    /// Most recent forced or transient recovery
    pub fn last_primary_fired(&self) -> Option<Instant> {
        let forced = self.last_fired(RecoveryCategory::ForcedPermanent);
        let transient = self.last_fired(RecoveryCategory::Transient);
        forced.max(transient)
    }
}

/// Environment snapshot taken when a recovery check expires
#[derive(Debug, Clone, Copy)]
pub struct RecoveryContext {
    pub category: RecoveryCategory,
    pub now: Instant,
    pub pause_reason: PauseReason,
    pub engine_playing: bool,
    pub communication_mode: bool,
    pub other_app_playing: bool,
    /// A remote (automotive-class) controller was recently active
    pub remote_recently_active: bool,
    /// The engine started playing within the engine-start window
    pub engine_recently_started: bool,
}

/// Decide whether a recovery may fire
///
/// Checks run in a fixed order and the first failing one is reported.
/// A retry ignores the primary cooldowns but must fall inside
/// `post_recovery_window` of the last primary recovery.
pub fn check_eligibility(
    ctx: &RecoveryContext,
    cooldowns: &Cooldowns,
    post_recovery_window: Duration,
) -> Result<(), SuppressionReason> {
    if ctx.category == RecoveryCategory::PostRecoveryRetry
        && !is_within(ctx.now, cooldowns.last_primary_fired(), post_recovery_window)
    {
        return Err(SuppressionReason::OutsideRetryWindow);
    }

    if !cooldowns.has_elapsed(ctx.category, ctx.now) {
        return Err(SuppressionReason::Cooldown);
    }

    if ctx.communication_mode {
        return Err(SuppressionReason::CommunicationMode);
    }

    if ctx.other_app_playing && !(ctx.remote_recently_active || ctx.engine_recently_started) {
        return Err(SuppressionReason::OtherAppActive);
    }

    match ctx.pause_reason {
        PauseReason::UserPause => return Err(SuppressionReason::UserPaused),
        PauseReason::BecomingNoisy => return Err(SuppressionReason::BecameNoisy),
        _ => {}
    }

    if ctx.engine_playing {
        return Err(SuppressionReason::AlreadyPlaying);
    }

    Ok(())
}

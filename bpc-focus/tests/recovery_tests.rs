//! Delayed recovery tests
//!
//! Recovery resumes playback when the platform never delivers a clean GAIN.
//! Every eligibility condition is evaluated when the delay expires.
//!
//! **Test Coverage:**
//! - Forced-permanent cooldown (suppressed inside the window, fires beyond it)
//! - Other-app / communication-mode vetoes and their overrides
//! - Focus request denied or failing
//! - Post-recovery retry when the first resume does not take
//! - User intent and superseding events cancel pending checks

mod helpers;

use bpc_common::events::{FocusNotice, SuppressionReason};
use bpc_focus::audio_system::FocusOutcome;
use bpc_focus::events::{EngineEvent, FocusSignal, PauseReason, RecoveryCategory};
use bpc_focus::scheduler::TaskKey;
use helpers::{Harness, HarnessBuilder};

fn fired(notices: &[FocusNotice], wanted: RecoveryCategory) -> usize {
    notices
        .iter()
        .filter(|n| matches!(n, FocusNotice::RecoveryFired { category, .. } if *category == wanted))
        .count()
}

fn suppressed(notices: &[FocusNotice], wanted: RecoveryCategory) -> Vec<SuppressionReason> {
    notices
        .iter()
        .filter_map(|n| match n {
            FocusNotice::RecoverySuppressed {
                category, reason, ..
            } if *category == wanted => Some(*reason),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Cooldowns
// ============================================================================

/// **Given:** Permanent loss with no GAIN afterwards
/// **When:** The forced recovery fires, a second one is attempted inside the
///           cooldown window, and a third one beyond it
/// **Then:** First and third fire, the second is suppressed by cooldown
#[tokio::test(start_paused = true)]
async fn test_forced_recovery_cooldown() {
    let mut h = Harness::playing().await;

    // First attempt at 1.5 s
    let status = h.focus(FocusSignal::LossPermanent).await;
    assert!(status
        .pending_tasks
        .contains(&TaskKey::Recovery(RecoveryCategory::ForcedPermanent)));
    let status = h.advance(1_600).await;
    assert!(status.engine_playing);
    assert_eq!(status.pause_reason, PauseReason::None);
    assert_eq!(h.play_count(), 1);

    // Confirm at 2.5 s observes playback running
    h.advance(1_000).await;

    // Second attempt ~2.6 s after the first: inside the 10 s window
    h.focus(FocusSignal::LossPermanent).await;
    let status = h.advance(1_600).await;
    assert!(!status.engine_playing);
    assert_eq!(h.play_count(), 1);

    // Third attempt well beyond the window
    h.advance(8_000).await;
    h.user_play().await;
    assert_eq!(h.play_count(), 2);
    h.focus(FocusSignal::LossPermanent).await;
    let status = h.advance(1_600).await;
    assert!(status.engine_playing);
    assert_eq!(h.play_count(), 3);

    let notices = h.drain_notices();
    assert_eq!(fired(&notices, RecoveryCategory::ForcedPermanent), 2);
    assert_eq!(
        suppressed(&notices, RecoveryCategory::ForcedPermanent),
        vec![SuppressionReason::Cooldown]
    );
    assert!(suppressed(&notices, RecoveryCategory::PostRecoveryRetry)
        .iter()
        .all(|r| *r == SuppressionReason::AlreadyPlaying));
}

/// **Given:** Transient loss with no GAIN afterwards
/// **When:** The transient recovery delay expires
/// **Then:** Playback resumes through the transient category
#[tokio::test(start_paused = true)]
async fn test_transient_recovery_fires_without_gain() {
    let mut h = Harness::playing().await;

    h.focus(FocusSignal::LossTransient).await;
    let status = h.advance(h.config.transient_recovery_delay_ms - 100).await;
    assert!(!status.engine_playing, "not before the delay");

    let status = h.advance(200).await;
    assert!(status.engine_playing);
    assert_eq!(fired(&h.drain_notices(), RecoveryCategory::Transient), 1);
}

// ============================================================================
// Environment vetoes
// ============================================================================

/// **Given:** Another application is audibly playing, no controller or
///            engine-start signal
/// **When:** LOSS_PERMANENT and every delay and cooldown elapses
/// **Then:** Forced recovery never fires
#[tokio::test(start_paused = true)]
async fn test_other_app_active_blocks_forced_recovery() {
    let mut h = Harness::playing().await;
    h.rig.audio_system.set_other_app_playing(true);

    h.focus(FocusSignal::LossPermanent).await;
    let status = h.advance(30_000).await;

    assert!(!status.engine_playing);
    assert_eq!(h.play_count(), 0);
    assert_eq!(status.pause_reason, PauseReason::FocusLossPermanent);
    assert_eq!(
        suppressed(&h.drain_notices(), RecoveryCategory::ForcedPermanent),
        vec![SuppressionReason::OtherAppActive]
    );
}

/// **Given:** Another application is audible, but the engine just started
/// **When:** LOSS_PERMANENT and the recovery delay expires
/// **Then:** The recent engine start overrides the other-app veto
#[tokio::test(start_paused = true)]
async fn test_recent_engine_start_overrides_other_app() {
    let h = Harness::playing().await;
    h.engine_event(EngineEvent::IsPlayingChanged { playing: true })
        .await;
    h.rig.audio_system.set_other_app_playing(true);

    h.focus(FocusSignal::LossPermanent).await;
    let status = h.advance(1_600).await;
    assert!(status.engine_playing);
}

/// **Given:** Another application is audible, but a car head unit is driving playback
/// **When:** LOSS_PERMANENT and the recovery delay expires
/// **Then:** The remote controller overrides the other-app veto
#[tokio::test(start_paused = true)]
async fn test_remote_controller_overrides_other_app() {
    let h = Harness::playing().await;
    h.advance(h.config.engine_start_window_ms + 1_000).await;
    h.handle.controller_connected("com.example.automotive.host").unwrap();
    h.rig.audio_system.set_other_app_playing(true);

    h.focus(FocusSignal::LossPermanent).await;
    let status = h.advance(1_600).await;
    assert!(status.engine_playing);
}

/// **Given:** Device in a call (communication mode)
/// **When:** Recovery delay expires
/// **Then:** Suppressed
#[tokio::test(start_paused = true)]
async fn test_communication_mode_blocks_recovery() {
    let mut h = Harness::playing().await;
    h.rig.audio_system.set_communication_mode(true);

    h.focus(FocusSignal::LossTransient).await;
    let status = h.advance(5_000).await;
    assert!(!status.engine_playing);
    assert_eq!(
        suppressed(&h.drain_notices(), RecoveryCategory::Transient),
        vec![SuppressionReason::CommunicationMode]
    );
}

/// **Given:** The audio manager denies, then fails, focus requests
/// **When:** Recovery delay expires
/// **Then:** No resume is forced; the failure is reported, not fatal
#[tokio::test(start_paused = true)]
async fn test_focus_request_denied_or_failing() {
    let mut h = Harness::playing().await;

    h.rig.audio_system.set_focus_outcome(FocusOutcome::Denied);
    h.focus(FocusSignal::LossPermanent).await;
    let status = h.advance(2_000).await;
    assert!(!status.engine_playing);

    h.rig.audio_system.set_focus_outcome(FocusOutcome::Fail);
    h.focus(FocusSignal::LossTransient).await;
    let status = h.advance(3_000).await;
    assert!(!status.engine_playing);
    assert_eq!(h.play_count(), 0);

    let notices = h.drain_notices();
    assert_eq!(
        suppressed(&notices, RecoveryCategory::ForcedPermanent),
        vec![SuppressionReason::FocusDenied]
    );
    assert_eq!(
        suppressed(&notices, RecoveryCategory::Transient),
        vec![SuppressionReason::FocusRequestFailed]
    );

    // Controller still serves commands
    h.rig.audio_system.set_focus_outcome(FocusOutcome::Granted);
    assert!(h.user_play().await.engine_playing);
}

// ============================================================================
// Superseding events
// ============================================================================

/// **Given:** A pending recovery after a transient loss
/// **When:** The user pauses before it expires
/// **Then:** The recovery is cancelled and never resumes playback
#[tokio::test(start_paused = true)]
async fn test_user_pause_cancels_pending_recovery() {
    let h = Harness::playing().await;

    h.focus(FocusSignal::LossTransient).await;
    let status = h.user_pause().await;
    assert!(status.pending_tasks.is_empty());

    let status = h.advance(10_000).await;
    assert_eq!(status.pause_reason, PauseReason::UserPause);
    assert_eq!(h.play_count(), 0);
}

/// **Given:** A pending transient recovery
/// **When:** Something else resumes the engine before expiry
/// **Then:** The recovery sees it playing and does nothing
#[tokio::test(start_paused = true)]
async fn test_recovery_skipped_when_already_playing() {
    let mut h = Harness::playing().await;

    h.focus(FocusSignal::LossTransient).await;
    h.rig.engine.set_playing(true);
    h.advance(3_000).await;

    assert_eq!(h.play_count(), 0);
    assert_eq!(
        suppressed(&h.drain_notices(), RecoveryCategory::Transient),
        vec![SuppressionReason::AlreadyPlaying]
    );
}

/// **Given:** A pending transient recovery
/// **When:** A permanent loss arrives before it expires
/// **Then:** Only the forced-permanent check remains scheduled
#[tokio::test(start_paused = true)]
async fn test_newer_loss_supersedes_pending_recovery() {
    let h = Harness::playing().await;

    h.focus(FocusSignal::LossTransient).await;
    h.rig.engine.set_playing(false);
    let status = h.focus(FocusSignal::LossPermanent).await;

    assert!(status.was_playing_before_loss);
    assert_eq!(
        status.pending_tasks,
        vec![TaskKey::Recovery(RecoveryCategory::ForcedPermanent)]
    );
}

// ============================================================================
// Post-recovery retry
// ============================================================================

/// **Given:** A forced recovery fired but playback stopped again immediately
/// **When:** The confirm delay expires
/// **Then:** One retry resumes playback; no further retry is scheduled
#[tokio::test(start_paused = true)]
async fn test_post_recovery_retry_when_resume_did_not_take() {
    let mut h = Harness::playing().await;

    h.focus(FocusSignal::LossPermanent).await;
    let status = h.advance(1_600).await;
    assert!(status.engine_playing);
    assert!(status
        .pending_tasks
        .contains(&TaskKey::Recovery(RecoveryCategory::PostRecoveryRetry)));

    // Output stalls without any callback
    h.rig.engine.set_playing(false);
    let status = h.advance(h.config.post_recovery_confirm_ms).await;
    assert!(status.engine_playing);
    assert!(status.pending_tasks.is_empty());
    assert_eq!(h.play_count(), 2);

    let notices = h.drain_notices();
    assert_eq!(fired(&notices, RecoveryCategory::ForcedPermanent), 1);
    assert_eq!(fired(&notices, RecoveryCategory::PostRecoveryRetry), 1);
}

/// **Given:** The engine refuses to play
/// **When:** Forced recovery and its retry run
/// **Then:** The engine stays paused in FOCUS_LOSS_PERMANENT
#[tokio::test(start_paused = true)]
async fn test_failed_resume_leaves_engine_paused() {
    let h = HarnessBuilder::new().playing().start().await;
    h.rig.engine.set_fail_play(true);

    h.focus(FocusSignal::LossPermanent).await;
    let status = h.advance(5_000).await;

    assert!(!status.engine_playing);
    assert_eq!(status.pause_reason, PauseReason::FocusLossPermanent);
    // Primary attempt plus exactly one retry
    assert_eq!(h.play_count(), 2);
    assert!(status.pending_tasks.is_empty());
}

//! Track transition tests: crossfade ramps, playback rate and effects
//!
//! **Test Coverage:**
//! - Natural transitions ramp 0 -> output volume; explicit jumps do not
//! - Ramp interrupted by duck, pause or playback error
//! - Per-track pitch/speed with 1.0 defaults, lookup failure fallback
//! - Effects chain recreated per audio session, applied or reset per track

mod helpers;

use bpc_focus::effects::{EffectsCall, TrackAudioSettings};
use bpc_focus::events::{EngineEvent, FocusSignal, TransitionReason};
use helpers::{count_of, Harness, HarnessBuilder};

fn transition(track_id: &str, reason: TransitionReason) -> EngineEvent {
    EngineEvent::TrackTransition {
        track_id: Some(track_id.to_string()),
        reason,
    }
}

async fn crossfading(volume: f32) -> Harness {
    HarnessBuilder::new()
        .playing()
        .volume(volume)
        .preferences(|p| p.crossfade_ms = 3_000)
        .start()
        .await
}

// ========================================
// Crossfade
// ========================================

/// **Given:** Crossfade 3000 ms, playing at 0.8
/// **When:** Track ends naturally
/// **Then:** Volume ramps from 0 and lands on 0.8
#[tokio::test(start_paused = true)]
async fn test_natural_transition_ramps_volume() {
    let mut h = crossfading(0.8).await;

    let status = h.engine_event(transition("b", TransitionReason::Auto)).await;
    assert!(status.crossfade_active);
    assert_eq!(h.volume(), 0.0);

    h.advance(1_525).await;
    let mid = h.volume();
    assert!(mid > 0.3 && mid < 0.5, "halfway volume was {}", mid);

    let status = h.advance(1_600).await;
    assert!(!status.crossfade_active);
    assert_eq!(h.volume(), 0.8);

    let history = h.rig.engine.volume_history();
    assert!(history.windows(2).all(|w| w[0] <= w[1]), "ramp is monotonic");

    let notices = h.drain_notices();
    assert_eq!(count_of(&notices, "CrossfadeStarted"), 1);
    assert_eq!(count_of(&notices, "CrossfadeCompleted"), 1);
}

/// **Given:** Crossfade enabled
/// **When:** Listener seeks to another item
/// **Then:** No ramp
#[tokio::test(start_paused = true)]
async fn test_seek_does_not_ramp() {
    let h = crossfading(1.0).await;

    let status = h.engine_event(transition("b", TransitionReason::Seek)).await;

    assert!(!status.crossfade_active);
    assert!(h.rig.engine.volume_history().is_empty());
    assert_eq!(h.volume(), 1.0);
}

/// **Given:** Crossfade disabled (0 ms)
/// **When:** Natural transition
/// **Then:** No ramp
#[tokio::test(start_paused = true)]
async fn test_zero_duration_disables_crossfade() {
    let h = Harness::playing().await;

    let status = h.engine_event(transition("b", TransitionReason::Repeat)).await;
    assert!(!status.crossfade_active);
}

/// **Given:** Crossfade preference changed at runtime
/// **When:** Natural transition
/// **Then:** New duration used
#[tokio::test(start_paused = true)]
async fn test_crossfade_preference_applies_live() {
    let h = Harness::playing().await;

    h.preferences.set_crossfade_ms(500);
    h.flush().await;
    let status = h.engine_event(transition("b", TransitionReason::Auto)).await;
    assert!(status.crossfade_active);

    let status = h.advance(600).await;
    assert!(!status.crossfade_active);
    assert_eq!(h.volume(), 1.0);
}

/// **Given:** Ramp in progress
/// **When:** Explicit jump to another item
/// **Then:** Ramp abandoned at full volume
#[tokio::test(start_paused = true)]
async fn test_seek_mid_ramp_lands_on_full_volume() {
    let h = crossfading(0.6).await;
    h.engine_event(transition("b", TransitionReason::Auto)).await;
    h.advance(500).await;

    let status = h.engine_event(transition("c", TransitionReason::Seek)).await;

    assert!(!status.crossfade_active);
    assert_eq!(h.volume(), 0.6);
}

/// **Given:** Ramp in progress at listener volume 1.0
/// **When:** CAN_DUCK loss, then GAIN
/// **Then:** Duck from the listener volume, restore exactly 1.0
#[tokio::test(start_paused = true)]
async fn test_duck_mid_ramp_uses_listener_volume() {
    let h = crossfading(1.0).await;
    h.engine_event(transition("b", TransitionReason::Auto)).await;
    h.advance(1_000).await;

    let status = h.focus(FocusSignal::LossTransientCanDuck).await;
    assert!(!status.crossfade_active);
    assert!(status.duck.is_ducked);
    assert_eq!(status.duck.normal_volume, 1.0);
    assert_eq!(h.volume(), 0.2);

    // Ramp task must not push the volume back up while ducked
    h.advance(3_000).await;
    assert_eq!(h.volume(), 0.2);

    h.focus(FocusSignal::Gain).await;
    assert_eq!(h.volume(), 1.0);
}

/// **Given:** Ramp in progress
/// **When:** Listener pauses
/// **Then:** Ramp ends at the output volume
#[tokio::test(start_paused = true)]
async fn test_pause_mid_ramp_restores_volume() {
    let h = crossfading(0.7).await;
    h.engine_event(transition("b", TransitionReason::Auto)).await;
    h.advance(800).await;

    let status = h.user_pause().await;

    assert!(!status.crossfade_active);
    assert_eq!(h.volume(), 0.7);
}

/// **Given:** Ramp in progress
/// **When:** Engine reports a playback error
/// **Then:** Ramp ends at the output volume
#[tokio::test(start_paused = true)]
async fn test_playback_error_mid_ramp_restores_volume() {
    let h = crossfading(0.9).await;
    h.engine_event(transition("b", TransitionReason::Auto)).await;
    h.advance(200).await;

    let status = h
        .engine_event(EngineEvent::PlaybackError {
            message: "decoder failed".to_string(),
        })
        .await;

    assert!(!status.crossfade_active);
    assert_eq!(h.volume(), 0.9);
}

// ========================================
// Playback rate
// ========================================

/// **Given:** One track with stored pitch/speed, one without
/// **When:** Transitions to each
/// **Then:** Stored values applied, then reset to 1.0
#[tokio::test(start_paused = true)]
async fn test_per_track_rate_and_default_reset() {
    let h = Harness::playing().await;
    h.rig.track_settings.insert(
        "slow",
        TrackAudioSettings {
            pitch: 0.9,
            speed: 0.75,
            ..Default::default()
        },
    );

    h.engine_event(transition("slow", TransitionReason::Seek)).await;
    assert_eq!(h.rig.engine.playback_rate(), (0.9, 0.75));

    h.engine_event(transition("plain", TransitionReason::Auto)).await;
    assert_eq!(h.rig.engine.playback_rate(), (1.0, 1.0));
}

/// **Given:** Settings store failing
/// **When:** Transition to a track with stored settings
/// **Then:** Defaults used, transition completes
#[tokio::test(start_paused = true)]
async fn test_lookup_failure_falls_back_to_defaults() {
    let h = Harness::playing().await;
    h.rig.track_settings.insert(
        "fast",
        TrackAudioSettings {
            speed: 1.5,
            ..Default::default()
        },
    );
    h.engine_event(transition("fast", TransitionReason::Seek)).await;
    assert_eq!(h.rig.engine.playback_rate(), (1.0, 1.5));

    h.rig.track_settings.set_fail(true);
    let status = h.engine_event(transition("fast", TransitionReason::Seek)).await;

    assert_eq!(h.rig.engine.playback_rate(), (1.0, 1.0));
    assert!(status.engine_playing);
}

// ========================================
// Effects
// ========================================

/// **Given:** Audio session 7 with an enabled track and a plain track
/// **When:** Transitions, then session changes to 9
/// **Then:** Apply, reset, release old chain before creating the new one
#[tokio::test(start_paused = true)]
async fn test_effects_follow_session_and_track() {
    let h = Harness::playing().await;
    let boosted = TrackAudioSettings {
        enabled: true,
        bass_boost: 600,
        eq_band_gains_db: vec![3.0, 0.0, -2.0],
        ..Default::default()
    };
    h.rig.track_settings.insert("boosted", boosted.clone());

    h.engine_event(EngineEvent::AudioSessionChanged { session_id: 7 })
        .await;
    h.engine_event(transition("boosted", TransitionReason::Seek)).await;
    h.engine_event(transition("plain", TransitionReason::Seek)).await;
    h.engine_event(EngineEvent::AudioSessionChanged { session_id: 7 })
        .await;
    h.engine_event(EngineEvent::AudioSessionChanged { session_id: 9 })
        .await;

    assert_eq!(
        h.rig.effects_factory.calls(),
        vec![
            EffectsCall::Create { session_id: 7 },
            EffectsCall::Apply {
                session_id: 7,
                settings: boosted,
            },
            EffectsCall::Reset { session_id: 7 },
            EffectsCall::Release { session_id: 7 },
            EffectsCall::Create { session_id: 9 },
        ]
    );
    assert_eq!(h.rig.effects.session_id().await, Some(9));
}

/// **Given:** Effects creation failing for the session
/// **When:** Track transition with enabled settings
/// **Then:** Playback continues without effects
#[tokio::test(start_paused = true)]
async fn test_effects_creation_failure_is_survivable() {
    let h = Harness::playing().await;
    h.rig.effects_factory.set_fail_create(true);
    h.rig.track_settings.insert(
        "boosted",
        TrackAudioSettings {
            enabled: true,
            ..Default::default()
        },
    );

    h.engine_event(EngineEvent::AudioSessionChanged { session_id: 3 })
        .await;
    let status = h.engine_event(transition("boosted", TransitionReason::Seek)).await;

    assert!(status.engine_playing);
    assert!(h.rig.effects_factory.calls().is_empty());
    assert_eq!(h.rig.effects.session_id().await, None);
}

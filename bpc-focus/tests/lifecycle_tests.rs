//! Controller lifecycle tests
//!
//! **Test Coverage:**
//! - Shutdown cancels every pending continuation
//! - Effects released and focus abandoned on shutdown
//! - Handle calls after shutdown report a stopped controller

mod helpers;

use bpc_common::Clock;
use bpc_focus::effects::EffectsCall;
use bpc_focus::events::{EngineEvent, FocusSignal};
use bpc_focus::Error;
use helpers::Harness;

/// **Given:** Recovery and sleep timer pending, effects bound
/// **When:** Controller shut down
/// **Then:** Nothing fires afterwards; effects released; focus abandoned
#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_and_releases() {
    let h = Harness::playing().await;
    h.engine_event(EngineEvent::AudioSessionChanged { session_id: 4 })
        .await;
    h.preferences
        .set_sleep_timer_target(h.rig.clock.epoch_ms() + 5_000);
    h.focus(FocusSignal::LossTransient).await;
    let status = h.flush().await;
    assert!(status.pending_tasks.len() >= 2);

    h.shutdown().await;
    tokio::time::sleep(std::time::Duration::from_secs(60)).await;

    assert_eq!(h.play_count(), 0, "no recovery after shutdown");
    assert_eq!(h.pause_count(), 1, "only the focus-loss pause");
    assert!(h.rig.audio_system.was_abandoned());
    assert_eq!(
        h.rig.effects_factory.calls().last(),
        Some(&EffectsCall::Release { session_id: 4 })
    );
    assert_eq!(h.rig.effects.session_id().await, None);
}

/// **Given:** Controller shut down
/// **When:** Events and status queries sent
/// **Then:** `ControllerStopped` returned; second shutdown is Ok
#[tokio::test(start_paused = true)]
async fn test_handle_after_shutdown() {
    let h = Harness::playing().await;
    h.shutdown().await;

    assert!(matches!(
        h.handle.focus(FocusSignal::Gain),
        Err(Error::ControllerStopped)
    ));
    assert!(matches!(h.handle.status().await, Err(Error::ControllerStopped)));
    assert!(h.handle.shutdown().await.is_ok());
}

/// **Given:** Two clones of the handle
/// **When:** Both request shutdown concurrently
/// **Then:** Both complete
#[tokio::test(start_paused = true)]
async fn test_concurrent_shutdown() {
    let h = Harness::playing().await;
    let other = h.handle.clone();

    let (a, b) = tokio::join!(h.handle.shutdown(), other.shutdown());
    assert!(a.is_ok() && b.is_ok());
}

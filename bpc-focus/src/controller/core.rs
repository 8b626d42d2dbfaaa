//! Controller lifecycle and event loop
//!
//! **Responsibilities:**
//! - Own all focus state inside one task
//! - Merge inputs (handle commands, preference watchers, route broadcasts,
//!   timer expiries) into a single ordered stream
//! - Serve status queries in queue order
//! - Tear down every resource on shutdown

use crate::audio_system::AudioSystem;
use crate::config::FocusConfig;
use crate::crossfade::CrossfadeCoordinator;
use crate::effects::{EffectsSlot, TrackSettingsLookup};
use crate::engine::PlaybackEngine;
use crate::error::{Error, Result};
use crate::events::{
    ClientEvent, ControllerEvent, EngineEvent, FocusNotice, FocusSignal, PauseReason,
    PreferenceEvent, RouteEvent, TimerEvent, UserCommand,
};
use crate::notification::{GateOutcome, NotificationGate, NotificationSurface};
use crate::preferences::{PlaybackPreferences, PreferenceHub};
use crate::recovery::Cooldowns;
use crate::remote::ControllerTrackers;
use crate::route::{NoisyRouteSource, RouteObserver};
use crate::scheduler::{Scheduler, TaskKey};
use crate::sleep_timer::SleepTimerScheduler;
use crate::state::{ControllerStatus, FocusState};
use bpc_common::events::{EventBus, TransportAction};
use bpc_common::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Collaborators injected into the controller
pub struct ControllerParts {
    pub engine: Arc<dyn PlaybackEngine>,
    pub audio_system: Arc<dyn AudioSystem>,
    pub routes: Arc<dyn RouteObserver>,
    /// Noisy-route broadcasts; `None` when the platform has no such signal
    pub noisy_routes: Option<Arc<NoisyRouteSource>>,
    pub trackers: Arc<ControllerTrackers>,
    pub surface: Arc<dyn NotificationSurface>,
    pub track_settings: Arc<dyn TrackSettingsLookup>,
    pub effects: Arc<EffectsSlot>,
    pub clock: Arc<dyn Clock>,
}

pub(super) enum Message {
    Event(ControllerEvent),
    Status(oneshot::Sender<ControllerStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle for feeding and querying a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Message>,
    notices: Arc<EventBus>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ControllerHandle {
    /// Queue an input event
    pub fn send(&self, event: impl Into<ControllerEvent>) -> Result<()> {
        self.tx
            .send(Message::Event(event.into()))
            .map_err(|_| Error::ControllerStopped)
    }

    pub fn focus(&self, signal: FocusSignal) -> Result<()> {
        self.send(signal)
    }

    pub fn engine(&self, event: EngineEvent) -> Result<()> {
        self.send(event)
    }

    /// Explicit user play
    pub fn play(&self) -> Result<()> {
        self.send(UserCommand::Play)
    }

    /// Explicit user pause
    pub fn pause(&self) -> Result<()> {
        self.send(UserCommand::Pause)
    }

    /// A transport-control client connected or issued a command
    pub fn controller_connected(&self, identifier: impl Into<String>) -> Result<()> {
        self.send(ControllerEvent::Client(ClientEvent::Connected {
            identifier: identifier.into(),
        }))
    }

    /// Snapshot taken after every previously queued event was processed
    pub async fn status(&self) -> Result<ControllerStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Message::Status(reply))
            .map_err(|_| Error::ControllerStopped)?;
        rx.await.map_err(|_| Error::ControllerStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FocusNotice> {
        self.notices.subscribe()
    }

    /// Stop the controller and wait for its task to finish
    ///
    /// Calling it again after the loop exited returns `Ok`.
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        if self.tx.send(Message::Shutdown(ack)).is_ok() {
            let _ = rx.await;
        }

        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!("Controller task ended abnormally: {}", e);
            }
        }
        Ok(())
    }
}

/// Audio focus and recovery state machine
///
/// All fields are owned by the controller task; nothing is shared with the
/// outside except through the injected collaborators.
pub struct FocusController {
    pub(super) engine: Arc<dyn PlaybackEngine>,
    pub(super) audio_system: Arc<dyn AudioSystem>,
    pub(super) routes: Arc<dyn RouteObserver>,
    pub(super) trackers: Arc<ControllerTrackers>,
    pub(super) track_settings: Arc<dyn TrackSettingsLookup>,
    pub(super) effects: Arc<EffectsSlot>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) preferences: Arc<PreferenceHub>,
    pub(super) config: FocusConfig,

    pub(super) state: FocusState,
    pub(super) prefs: PlaybackPreferences,
    pub(super) started_at: Instant,
    pub(super) last_engine_start: Option<Instant>,

    pub(super) cooldowns: Cooldowns,
    pub(super) scheduler: Scheduler,
    pub(super) crossfade: CrossfadeCoordinator,
    pub(super) notification: NotificationGate,
    pub(super) sleep_timer: SleepTimerScheduler,
    pub(super) notices: Arc<EventBus>,

    forwarders: Vec<JoinHandle<()>>,
}

impl FocusController {
    /// Start the controller task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        parts: ControllerParts,
        config: FocusConfig,
        preferences: Arc<PreferenceHub>,
    ) -> ControllerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let notices = Arc::new(EventBus::new(config.notice_capacity.max(1)));

        // Subscribe before taking the snapshot so no change falls in between
        let forwarders = spawn_forwarders(&tx, &preferences, parts.noisy_routes.as_deref());
        let prefs = preferences.snapshot();

        let volume = parts.engine.volume();
        let controller = FocusController {
            state: FocusState::new(volume),
            started_at: parts.clock.now(),
            last_engine_start: None,
            cooldowns: Cooldowns::new(&config.cooldowns),
            scheduler: Scheduler::new(timer_tx),
            crossfade: CrossfadeCoordinator::new(
                Duration::from_millis(prefs.crossfade_ms),
                config.crossfade_step(),
                config.crossfade_curve,
            ),
            notification: NotificationGate::new(parts.surface),
            sleep_timer: SleepTimerScheduler::new(),
            notices: Arc::clone(&notices),
            prefs,
            engine: parts.engine,
            audio_system: parts.audio_system,
            routes: parts.routes,
            trackers: parts.trackers,
            track_settings: parts.track_settings,
            effects: parts.effects,
            clock: parts.clock,
            preferences,
            config,
            forwarders,
        };

        let task = tokio::spawn(controller.run(rx, timer_rx));

        ControllerHandle {
            tx,
            notices,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Message>,
        mut timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    ) {
        info!("Focus controller started");
        self.apply_initial_preferences();

        loop {
            tokio::select! {
                biased;

                Some(timer) = timer_rx.recv() => {
                    self.handle_event(ControllerEvent::Timer(timer)).await;
                }

                message = rx.recv() => match message {
                    Some(Message::Event(event)) => self.handle_event(event).await,
                    Some(Message::Status(reply)) => {
                        let _ = reply.send(self.status());
                    }
                    Some(Message::Shutdown(ack)) => {
                        self.shutdown().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        debug!("All controller handles dropped");
                        self.shutdown().await;
                        break;
                    }
                },
            }
        }

        info!("Focus controller stopped");
    }

    pub(super) async fn handle_event(&mut self, event: ControllerEvent) {
        trace!("Controller event: {:?}", event);
        match event {
            ControllerEvent::Focus(signal) => self.on_focus_signal(signal),
            ControllerEvent::Route(RouteEvent::BecomingNoisy) => self.on_becoming_noisy(),
            ControllerEvent::Engine(event) => self.on_engine_event(event).await,
            ControllerEvent::Preference(event) => self.on_preference(event),
            ControllerEvent::Timer(timer) => self.on_timer(timer),
            ControllerEvent::Client(ClientEvent::Connected { identifier }) => {
                self.trackers.record_client(&identifier);
            }
            ControllerEvent::Command(command) => self.on_user_command(command),
        }
    }

    fn on_timer(&mut self, timer: TimerEvent) {
        if !self.scheduler.accept(&timer) {
            debug!("Discarding stale expiry for {:?}", timer.key);
            return;
        }

        match timer.key {
            TaskKey::Recovery(category) => self.attempt_recovery(category),
            TaskKey::RouteSettle => self.on_route_settled(),
            TaskKey::CrossfadeStep => self.on_crossfade_step(),
            TaskKey::SleepTimer => self.on_sleep_timer_due(),
        }
    }

    pub(super) fn status(&self) -> ControllerStatus {
        ControllerStatus {
            pause_reason: self.state.pause_reason,
            last_focus_signal: self.state.last_signal,
            was_playing_before_loss: self.state.was_playing_before_loss,
            duck: self.state.duck,
            engine_playing: self.engine.is_playing(),
            remote_controller_active: self.remote_recently_active(),
            external_controller_active: self
                .trackers
                .external
                .is_recently_active(self.config.external_controller_window()),
            notification_bound: self.notification.is_bound(),
            crossfade_active: self.crossfade.is_active(),
            sleep_timer_target_ms: self.sleep_timer.target_ms(),
            pending_tasks: self.scheduler.pending_keys(),
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down focus controller");

        self.scheduler.cancel_all();
        self.crossfade.cancel();

        // Ends the noisy-route subscription and preference watchers
        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }

        self.effects.release().await;

        if let Err(e) = self.audio_system.abandon_focus() {
            warn!("Failed to abandon audio focus: {}", e);
        }
    }

    /// Transition the pause reason, emitting a notice on change
    pub(super) fn set_pause_reason(&mut self, new_reason: PauseReason) {
        let old_reason = self.state.pause_reason;
        if old_reason == new_reason {
            return;
        }
        info!("Pause reason: {} -> {}", old_reason, new_reason);
        self.state.pause_reason = new_reason;
        self.notices.emit_lossy(FocusNotice::PauseReasonChanged {
            old_reason,
            new_reason,
            timestamp: bpc_common::time::now(),
        });
    }

    pub(super) fn emit_transport(&self, action: TransportAction, cause: &str) {
        self.notices.emit_lossy(FocusNotice::TransportCommand {
            action,
            cause: cause.to_string(),
            timestamp: bpc_common::time::now(),
        });
    }

    pub(super) fn emit_gate_outcome(&self, outcome: GateOutcome) {
        let notice = match outcome {
            GateOutcome::Bound => FocusNotice::NotificationVisibility {
                bound: true,
                timestamp: bpc_common::time::now(),
            },
            GateOutcome::Unbound => FocusNotice::NotificationVisibility {
                bound: false,
                timestamp: bpc_common::time::now(),
            },
            GateOutcome::Failed(error) => FocusNotice::NotificationFailed {
                error,
                timestamp: bpc_common::time::now(),
            },
        };
        self.notices.emit_lossy(notice);
    }
}

/// Tasks that pump preference changes and route broadcasts into the queue
///
/// Forwarders hold weak senders so they never keep the controller alive.
fn spawn_forwarders(
    tx: &mpsc::UnboundedSender<Message>,
    preferences: &PreferenceHub,
    noisy_routes: Option<&NoisyRouteSource>,
) -> Vec<JoinHandle<()>> {
    let receivers = preferences.subscribe();
    let mut forwarders = vec![
        forward_watch(tx, receivers.notification_visible, PreferenceEvent::NotificationVisible),
        forward_watch(tx, receivers.crossfade_ms, PreferenceEvent::CrossfadeMs),
        forward_watch(tx, receivers.pause_on_noisy, PreferenceEvent::PauseOnNoisy),
        forward_watch(tx, receivers.resume_on_focus, PreferenceEvent::ResumeOnFocus),
        forward_watch(tx, receivers.sleep_timer_target_ms, PreferenceEvent::SleepTimerTarget),
    ];

    if let Some(source) = noisy_routes {
        let mut routes = source.subscribe();
        let weak = tx.downgrade();
        forwarders.push(tokio::spawn(async move {
            loop {
                match routes.recv().await {
                    Ok(event) => {
                        let Some(tx) = weak.upgrade() else { break };
                        if tx.send(Message::Event(ControllerEvent::Route(event))).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Route listener lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    forwarders
}

fn forward_watch<T>(
    tx: &mpsc::UnboundedSender<Message>,
    mut rx: watch::Receiver<T>,
    wrap: fn(T) -> PreferenceEvent,
) -> JoinHandle<()>
where
    T: Copy + Send + Sync + 'static,
{
    let weak = tx.downgrade();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let value = *rx.borrow_and_update();
            let Some(tx) = weak.upgrade() else { break };
            if tx.send(Message::Event(wrap(value).into())).is_err() {
                break;
            }
        }
    })
}

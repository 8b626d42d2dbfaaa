//! Playback preferences
//!
//! Preferences are observed reactively: each one lives in its own
//! `tokio::sync::watch` channel inside `PreferenceHub`. The controller
//! subscribes at startup and forwards every change into its queue, so a
//! preference flip is processed in order with all other inputs.
//!
//! The hub optionally writes through to a `PreferenceStore`; persistence
//! failures are logged and never block the in-memory update.

use crate::error::{Error, Result};
use bpc_common::config::{load_toml_or_default, write_toml_atomic};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Persisted playback preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackPreferences {
    /// Show the persistent transport-control surface
    pub notification_visible: bool,
    /// Crossfade duration on natural transitions (0 disables)
    pub crossfade_ms: u64,
    /// Pause when the output route becomes noisy
    pub pause_on_noisy: bool,
    /// Resume after a permanent loss when focus returns
    pub resume_on_focus: bool,
    /// Sleep timer target, epoch milliseconds (0 disables)
    pub sleep_timer_target_ms: i64,
}

impl Default for PlaybackPreferences {
    fn default() -> Self {
        Self {
            notification_visible: true,
            crossfade_ms: 0,
            pause_on_noisy: true,
            resume_on_focus: false,
            sleep_timer_target_ms: 0,
        }
    }
}

/// Preference persistence
pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Result<PlaybackPreferences>;
    fn save(&self, preferences: &PlaybackPreferences) -> Result<()>;
}

/// TOML file store
#[derive(Debug, Clone)]
pub struct TomlPreferenceStore {
    path: PathBuf,
}

impl TomlPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for TomlPreferenceStore {
    /// Missing file yields defaults
    fn load(&self) -> Result<PlaybackPreferences> {
        load_toml_or_default(Some(&self.path)).map_err(|e| Error::Preferences(e.to_string()))
    }

    fn save(&self, preferences: &PlaybackPreferences) -> Result<()> {
        write_toml_atomic(&self.path, preferences).map_err(|e| Error::Preferences(e.to_string()))
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    stored: Mutex<PlaybackPreferences>,
    saves: AtomicUsize,
}

impl MemoryPreferenceStore {
    pub fn new(initial: PlaybackPreferences) -> Self {
        Self {
            stored: Mutex::new(initial),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn stored(&self) -> PlaybackPreferences {
        self.stored.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<PlaybackPreferences> {
        Ok(self.stored())
    }

    fn save(&self, preferences: &PlaybackPreferences) -> Result<()> {
        *self.stored.lock().unwrap_or_else(|p| p.into_inner()) = preferences.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Receivers for every preference channel
pub struct PreferenceReceivers {
    pub notification_visible: watch::Receiver<bool>,
    pub crossfade_ms: watch::Receiver<u64>,
    pub pause_on_noisy: watch::Receiver<bool>,
    pub resume_on_focus: watch::Receiver<bool>,
    pub sleep_timer_target_ms: watch::Receiver<i64>,
}

/// Reactive preference holder
pub struct PreferenceHub {
    notification_visible: watch::Sender<bool>,
    crossfade_ms: watch::Sender<u64>,
    pause_on_noisy: watch::Sender<bool>,
    resume_on_focus: watch::Sender<bool>,
    sleep_timer_target_ms: watch::Sender<i64>,
    store: Option<Arc<dyn PreferenceStore>>,
}

impl PreferenceHub {
    /// Hub seeded with `initial`, without persistence
    pub fn new(initial: PlaybackPreferences) -> Self {
        Self::build(initial, None)
    }

    /// Hub seeded from `store`, writing every change back to it
    pub fn load(store: Arc<dyn PreferenceStore>) -> Result<Self> {
        let initial = store.load()?;
        debug!("Loaded preferences: {:?}", initial);
        Ok(Self::build(initial, Some(store)))
    }

    fn build(initial: PlaybackPreferences, store: Option<Arc<dyn PreferenceStore>>) -> Self {
        Self {
            notification_visible: watch::channel(initial.notification_visible).0,
            crossfade_ms: watch::channel(initial.crossfade_ms).0,
            pause_on_noisy: watch::channel(initial.pause_on_noisy).0,
            resume_on_focus: watch::channel(initial.resume_on_focus).0,
            sleep_timer_target_ms: watch::channel(initial.sleep_timer_target_ms).0,
            store,
        }
    }

    pub fn snapshot(&self) -> PlaybackPreferences {
        PlaybackPreferences {
            notification_visible: *self.notification_visible.borrow(),
            crossfade_ms: *self.crossfade_ms.borrow(),
            pause_on_noisy: *self.pause_on_noisy.borrow(),
            resume_on_focus: *self.resume_on_focus.borrow(),
            sleep_timer_target_ms: *self.sleep_timer_target_ms.borrow(),
        }
    }

    pub fn subscribe(&self) -> PreferenceReceivers {
        PreferenceReceivers {
            notification_visible: self.notification_visible.subscribe(),
            crossfade_ms: self.crossfade_ms.subscribe(),
            pause_on_noisy: self.pause_on_noisy.subscribe(),
            resume_on_focus: self.resume_on_focus.subscribe(),
            sleep_timer_target_ms: self.sleep_timer_target_ms.subscribe(),
        }
    }

    pub fn set_notification_visible(&self, visible: bool) {
        self.notification_visible.send_replace(visible);
        self.persist();
    }

    pub fn set_crossfade_ms(&self, crossfade_ms: u64) {
        self.crossfade_ms.send_replace(crossfade_ms);
        self.persist();
    }

    pub fn set_pause_on_noisy(&self, enabled: bool) {
        self.pause_on_noisy.send_replace(enabled);
        self.persist();
    }

    pub fn set_resume_on_focus(&self, enabled: bool) {
        self.resume_on_focus.send_replace(enabled);
        self.persist();
    }

    pub fn set_sleep_timer_target(&self, target_ms: i64) {
        self.sleep_timer_target_ms.send_replace(target_ms);
        self.persist();
    }

    /// Disable the sleep timer in memory and in the store
    pub fn clear_sleep_timer(&self) {
        self.set_sleep_timer_target(0);
    }

    /// Disable the sleep timer only if it still targets `target_ms`
    ///
    /// Returns false, without touching the store, when another target was set.
    pub fn clear_sleep_timer_if(&self, target_ms: i64) -> bool {
        let cleared = self.sleep_timer_target_ms.send_if_modified(|current| {
            if *current == target_ms && *current != 0 {
                *current = 0;
                true
            } else {
                false
            }
        });
        if cleared {
            self.persist();
        }
        cleared
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.snapshot()) {
                warn!("Failed to persist preferences: {}", e);
            }
        }
    }
}

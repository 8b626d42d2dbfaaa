//! Audio output routing
//!
//! - `RouteObserver`: "is an external output attached right now?"
//! - `SharedRoutes`: in-memory device list implementing the observer
//! - `NoisyRouteSource`: subscribable stream of output-removed signals; the
//!   controller subscribes at startup and drops its subscription at shutdown

use crate::events::RouteEvent;
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Class of an attached output device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputDeviceKind {
    BuiltinSpeaker,
    BuiltinEarpiece,
    WiredHeadset,
    WiredHeadphones,
    BluetoothA2dp,
    BluetoothSco,
    UsbDevice,
    UsbHeadset,
    Hdmi,
    LineAnalog,
    LineDigital,
}

impl OutputDeviceKind {
    /// Wired, Bluetooth, USB, HDMI and line-out classes count as external
    pub fn is_external(&self) -> bool {
        !matches!(
            self,
            OutputDeviceKind::BuiltinSpeaker | OutputDeviceKind::BuiltinEarpiece
        )
    }
}

/// An attached output device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDevice {
    pub kind: OutputDeviceKind,
    pub name: String,
}

impl OutputDevice {
    pub fn new(kind: OutputDeviceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Pure query over currently attached outputs
pub trait RouteObserver: Send + Sync {
    fn has_external_output(&self) -> bool;
}

/// Thread-safe list of attached output devices
#[derive(Debug, Default)]
pub struct SharedRoutes {
    devices: RwLock<Vec<OutputDevice>>,
}

impl SharedRoutes {
    /// Start with only the built-in speaker attached
    pub fn new() -> Self {
        Self::with_devices(vec![OutputDevice::new(OutputDeviceKind::BuiltinSpeaker, "Speaker")])
    }

    pub fn with_devices(devices: Vec<OutputDevice>) -> Self {
        Self {
            devices: RwLock::new(devices),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<OutputDevice>> {
        self.devices.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<OutputDevice>> {
        self.devices.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn attach(&self, device: OutputDevice) {
        self.write().push(device);
    }

    /// Remove every device of `kind`; returns true if anything was removed
    pub fn detach(&self, kind: OutputDeviceKind) -> bool {
        let mut devices = self.write();
        let before = devices.len();
        devices.retain(|d| d.kind != kind);
        devices.len() != before
    }

    pub fn devices(&self) -> Vec<OutputDevice> {
        self.read().clone()
    }
}

impl RouteObserver for SharedRoutes {
    fn has_external_output(&self) -> bool {
        self.read().iter().any(|d| d.kind.is_external())
    }
}

/// Broadcast source of noisy-route (output removed) signals
pub struct NoisyRouteSource {
    tx: broadcast::Sender<RouteEvent>,
}

impl NoisyRouteSource {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Register for future signals; dropping the receiver deregisters
    pub fn subscribe(&self) -> broadcast::Receiver<RouteEvent> {
        self.tx.subscribe()
    }

    /// Deliver an output-removed signal to every registered listener
    pub fn notify_becoming_noisy(&self) {
        let _ = self.tx.send(RouteEvent::BecomingNoisy);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NoisyRouteSource {
    fn default() -> Self {
        Self::new(16)
    }
}

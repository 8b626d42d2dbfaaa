//! External controller activity tracking
//!
//! Two trackers of the same shape: one for remote (automotive-class)
//! controllers, one for any non-local controller connection. Each records the
//! last time it saw activity and answers "recently active within `window`".
//! Both are injected into the controller, never global.

use bpc_common::time::is_within;
use bpc_common::Clock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Last-seen timestamp with a windowed query
pub struct ActivityTracker {
    clock: Arc<dyn Clock>,
    last_seen: Mutex<Option<Instant>>,
}

impl ActivityTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_seen: Mutex::new(None),
        }
    }

    /// Stamp "last seen" to now
    pub fn mark_activity(&self) {
        let now = self.clock.now();
        *self.last_seen.lock().unwrap_or_else(|p| p.into_inner()) = Some(now);
    }

    /// Activity happened no longer than `window` ago
    pub fn is_recently_active(&self, window: Duration) -> bool {
        is_within(self.clock.now(), self.last_seen(), window)
    }

    pub fn last_seen(&self) -> Option<Instant> {
        *self.last_seen.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Classification of a connecting controller client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerClass {
    /// In-process UI or the service itself
    Local,
    /// Vehicle head-unit or similar remote transport client
    Automotive,
    /// Any other out-of-process client (watch, media button app, ...)
    External,
}

/// Classifies client identifiers by pattern match
#[derive(Debug, Clone)]
pub struct ClientClassifier {
    automotive_patterns: Vec<String>,
    local_ids: Vec<String>,
}

impl ClientClassifier {
    pub fn new(automotive_patterns: &[String], local_ids: &[String]) -> Self {
        Self {
            automotive_patterns: automotive_patterns.iter().map(|p| p.to_lowercase()).collect(),
            local_ids: local_ids.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    pub fn classify(&self, identifier: &str) -> ControllerClass {
        let id = identifier.trim().to_lowercase();
        if id.is_empty() || self.local_ids.iter().any(|local| *local == id) {
            return ControllerClass::Local;
        }
        if self.automotive_patterns.iter().any(|pattern| id.contains(pattern.as_str())) {
            return ControllerClass::Automotive;
        }
        ControllerClass::External
    }
}

/// Both trackers plus the classifier feeding them
pub struct ControllerTrackers {
    pub remote: ActivityTracker,
    pub external: ActivityTracker,
    classifier: ClientClassifier,
}

impl ControllerTrackers {
    pub fn new(clock: Arc<dyn Clock>, classifier: ClientClassifier) -> Self {
        Self {
            remote: ActivityTracker::new(Arc::clone(&clock)),
            external: ActivityTracker::new(clock),
            classifier,
        }
    }

    /// Record a connection (or command) from `identifier`
    ///
    /// Automotive clients stamp both trackers; other external clients stamp
    /// only the generic tracker; local clients stamp nothing.
    pub fn record_client(&self, identifier: &str) -> ControllerClass {
        let class = self.classifier.classify(identifier);
        match class {
            ControllerClass::Automotive => {
                self.remote.mark_activity();
                self.external.mark_activity();
            }
            ControllerClass::External => self.external.mark_activity(),
            ControllerClass::Local => {}
        }
        debug!("Controller client '{}' classified as {:?}", identifier, class);
        class
    }
}

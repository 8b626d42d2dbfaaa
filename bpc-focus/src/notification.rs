//! Visible transport-control surface gate
//!
//! The "show notification" preference decides whether the persistent
//! transport surface is bound. Turning it off unbinds and clears the
//! surface; turning it on binds it and refreshes it if an item is loaded.
//!
//! Any failure is logged and reported back to the caller. The gate never
//! keeps a half-finished state, so the next flip of the preference is
//! processed from scratch.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Platform transport-control surface
pub trait NotificationSurface: Send + Sync {
    fn bind(&self) -> Result<()>;
    fn unbind(&self) -> Result<()>;

    /// Remove any stale visible controls
    fn clear(&self) -> Result<()>;

    /// Redraw with the current item
    fn refresh(&self) -> Result<()>;
}

/// Result of applying a visibility change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Bound,
    Unbound,
    Failed(String),
}

/// Applies the visibility preference to the surface
pub struct NotificationGate {
    surface: Arc<dyn NotificationSurface>,
    bound: bool,
}

impl NotificationGate {
    pub fn new(surface: Arc<dyn NotificationSurface>) -> Self {
        Self {
            surface,
            bound: false,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Bind or unbind according to `visible`
    ///
    /// `has_content` tells whether a freshly bound surface should be refreshed.
    pub fn apply(&mut self, visible: bool, has_content: bool) -> GateOutcome {
        if visible {
            self.show(has_content)
        } else {
            self.hide()
        }
    }

    fn show(&mut self, has_content: bool) -> GateOutcome {
        if !self.bound {
            match self.surface.bind() {
                Ok(()) => {
                    self.bound = true;
                    info!("Transport surface bound");
                }
                Err(Error::SurfaceRejected(reason)) => {
                    warn!(
                        "Platform rejected foreground surface, continuing without visible controls: {}",
                        reason
                    );
                    return GateOutcome::Failed(reason);
                }
                Err(e) => {
                    warn!("Failed to bind transport surface: {}", e);
                    return GateOutcome::Failed(e.to_string());
                }
            }
        }

        if has_content {
            if let Err(e) = self.surface.refresh() {
                // Surface stays bound; the next item change redraws it
                warn!("Failed to refresh transport surface: {}", e);
            }
        } else {
            debug!("No media item loaded, skipping surface refresh");
        }
        GateOutcome::Bound
    }

    fn hide(&mut self) -> GateOutcome {
        // Unbind and clear even when not bound
        let unbind = self.surface.unbind();
        let clear = self.surface.clear();
        self.bound = false;

        let mut errors = Vec::new();
        if let Err(e) = unbind {
            warn!("Failed to unbind transport surface: {}", e);
            errors.push(e.to_string());
        }
        if let Err(e) = clear {
            warn!("Failed to clear transport surface: {}", e);
            errors.push(e.to_string());
        }

        if errors.is_empty() {
            info!("Transport surface unbound");
            GateOutcome::Unbound
        } else {
            GateOutcome::Failed(errors.join("; "))
        }
    }
}

/// How the next `bind` on a `RecordingSurface` should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindFailure {
    Rejected,
    Error,
}

/// Surface that records calls, with injectable bind failures
#[derive(Debug, Default)]
pub struct RecordingSurface {
    visible: AtomicBool,
    fail_next_bind: AtomicUsize,
    binds: AtomicUsize,
    unbinds: AtomicUsize,
    clears: AtomicUsize,
    refreshes: AtomicUsize,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `bind` call fail once
    pub fn fail_next_bind(&self, failure: BindFailure) {
        let code = match failure {
            BindFailure::Rejected => 1,
            BindFailure::Error => 2,
        };
        self.fail_next_bind.store(code, Ordering::SeqCst);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn unbind_count(&self) -> usize {
        self.unbinds.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl NotificationSurface for RecordingSurface {
    fn bind(&self) -> Result<()> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        match self.fail_next_bind.swap(0, Ordering::SeqCst) {
            1 => Err(Error::SurfaceRejected("background start not allowed".to_string())),
            2 => Err(Error::Surface("binder died".to_string())),
            _ => {
                self.visible.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn unbind(&self) -> Result<()> {
        self.unbinds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.visible.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

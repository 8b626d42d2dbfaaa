//! Operating-system audio manager boundary
//!
//! Read-only environment queries consulted by recovery eligibility, plus the
//! focus request the controller issues before a forced resume.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// OS audio manager operations used by the controller
pub trait AudioSystem: Send + Sync {
    /// Request audio focus; `Ok(false)` means the request was denied
    fn request_focus(&self) -> Result<bool>;

    /// Give up focus (controller shutdown)
    fn abandon_focus(&self) -> Result<()>;

    /// Device is in a telephony/communication audio mode
    fn is_communication_mode(&self) -> bool;

    /// Another application is audibly producing sound
    fn is_other_app_playing(&self) -> bool;
}

/// Outcome the simulated system returns for focus requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusOutcome {
    Granted,
    Denied,
    Fail,
}

impl FocusOutcome {
    fn to_u8(self) -> u8 {
        match self {
            FocusOutcome::Granted => 0,
            FocusOutcome::Denied => 1,
            FocusOutcome::Fail => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => FocusOutcome::Denied,
            2 => FocusOutcome::Fail,
            _ => FocusOutcome::Granted,
        }
    }
}

/// Lock-free simulated audio manager
#[derive(Debug, Default)]
pub struct SimulatedAudioSystem {
    communication_mode: AtomicBool,
    other_app_playing: AtomicBool,
    focus_outcome: AtomicU8,
    focus_requests: AtomicUsize,
    abandoned: AtomicBool,
}

impl SimulatedAudioSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_communication_mode(&self, active: bool) {
        self.communication_mode.store(active, Ordering::SeqCst);
    }

    pub fn set_other_app_playing(&self, playing: bool) {
        self.other_app_playing.store(playing, Ordering::SeqCst);
    }

    pub fn set_focus_outcome(&self, outcome: FocusOutcome) {
        self.focus_outcome.store(outcome.to_u8(), Ordering::SeqCst);
    }

    pub fn focus_requests(&self) -> usize {
        self.focus_requests.load(Ordering::SeqCst)
    }

    pub fn was_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }
}

impl AudioSystem for SimulatedAudioSystem {
    fn request_focus(&self) -> Result<bool> {
        self.focus_requests.fetch_add(1, Ordering::SeqCst);
        match FocusOutcome::from_u8(self.focus_outcome.load(Ordering::SeqCst)) {
            FocusOutcome::Granted => Ok(true),
            FocusOutcome::Denied => Ok(false),
            FocusOutcome::Fail => Err(Error::FocusRequest("simulated audio manager failure".to_string())),
        }
    }

    fn abandon_focus(&self) -> Result<()> {
        self.abandoned.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_communication_mode(&self) -> bool {
        self.communication_mode.load(Ordering::SeqCst)
    }

    fn is_other_app_playing(&self) -> bool {
        self.other_app_playing.load(Ordering::SeqCst)
    }
}

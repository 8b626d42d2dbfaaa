//! # Background Playback Controller: focus & recovery (bpc-focus)
//!
//! Keeps background audio playback in step with the platform's audio focus
//! arbitration, output-route changes, remote transport controllers and a
//! handful of user preferences.
//!
//! **Architecture:** one controller task owns all state and consumes a single
//! ordered queue of `ControllerEvent`s. Delays (route settle, recovery checks,
//! crossfade steps, sleep timer) are cancellable continuations that feed
//! back into the same queue and re-validate their conditions when they fire.

pub mod audio_system;
pub mod config;
pub mod controller;
pub mod crossfade;
pub mod effects;
pub mod engine;
pub mod error;
pub mod events;
pub mod notification;
pub mod policy;
pub mod preferences;
pub mod recovery;
pub mod remote;
pub mod route;
pub mod scenario;
pub mod scheduler;
pub mod simulation;
pub mod sleep_timer;
pub mod state;

pub use config::{Config, FocusConfig};
pub use controller::{ControllerHandle, ControllerParts, FocusController};
pub use error::{Error, Result};
pub use state::ControllerStatus;

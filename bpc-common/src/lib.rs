//! # BPC Common Library
//!
//! Shared code for the background playback controller crates:
//! - Error types
//! - Monotonic and wall-clock time sources (`Clock`)
//! - Decision notice types and the broadcast `EventBus`
//! - Fade curve definitions used by volume ramps
//! - Configuration file resolution

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod time;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use time::{AnchoredClock, Clock, SystemClock};

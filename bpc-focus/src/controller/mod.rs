//! Focus controller
//!
//! **Module Structure:**
//! - `core.rs`: Construction, queue loop, status, shutdown
//! - `focus.rs`: Focus signals, ducking, recovery scheduling and firing
//! - `route.rs`: Noisy-route handling with settle delay
//! - `playback.rs`: Engine callbacks, user commands, crossfade, effects
//! - `surfaces.rs`: Preferences, notification gate, sleep timer

mod core;
mod focus;
mod playback;
mod route;
mod surfaces;

pub use core::{ControllerHandle, ControllerParts, FocusController};

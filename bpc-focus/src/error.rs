//! Error types for bpc-focus
//!
//! Non-fatal categories (effects, focus request, surface bind, settings
//! lookup) are caught and logged at their call sites inside the controller
//! loop. Only configuration errors and controller-stopped errors reach the
//! caller.

use thiserror::Error;

/// Main error type for the focus controller
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared configuration/persistence errors from bpc-common
    #[error(transparent)]
    Common(#[from] bpc_common::Error),

    /// Playback engine rejected a transport command
    #[error("Engine error: {0}")]
    Engine(String),

    /// Audio focus request could not be completed
    #[error("Focus request failed: {0}")]
    FocusRequest(String),

    /// Transport surface bind/unbind failed
    #[error("Notification surface error: {0}")]
    Surface(String),

    /// Platform refused to start the visible foreground surface
    #[error("Foreground surface rejected by platform: {0}")]
    SurfaceRejected(String),

    /// Audio effects initialization or application failed
    #[error("Audio effects error: {0}")]
    Effects(String),

    /// Per-track settings lookup failed
    #[error("Track settings lookup failed: {0}")]
    SettingsLookup(String),

    /// Preference persistence failed
    #[error("Preference store error: {0}")]
    Preferences(String),

    /// Scenario script invalid
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// Controller loop has exited
    #[error("Controller stopped")]
    ControllerStopped,

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using bpc-focus Error
pub type Result<T> = std::result::Result<T, Error>;

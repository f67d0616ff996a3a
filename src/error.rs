//! Error types for the playback engine.

use thiserror::Error;

/// Errors returned by the control surface.
///
/// Tolerated conditions (malformed samples, nothing to play, no device
/// selected) are never errors; they are published as events instead.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Speed factor was zero, negative or not a number.
    #[error("Invalid speed factor: {0}")]
    InvalidSpeed(f64),

    /// The controller task is gone (shut down or panicked).
    #[error("Playback controller is closed")]
    ControllerClosed,

    /// The data source could not deliver a trajectory.
    #[error("Track source error: {0}")]
    Source(String),
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;

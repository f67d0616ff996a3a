//! Replay of recorded wagon GPS tracks: a cancellable, speed-adjustable
//! playback cursor with halt notifications and per-day movement statistics.

pub mod config;
pub mod core;
pub mod error;
pub mod gauge;
pub mod halt;
pub mod input;
pub mod playback;
pub mod renderer;
pub mod source;
pub mod stats;

pub use config::PlaybackSettings;
pub use error::{PlaybackError, PlaybackResult};
pub use playback::{PlaybackController, PlaybackEngine, PlaybackEvent, PlaybackPhase, PlaybackStatus};
pub use renderer::Renderer;
pub use source::{FileTrackSource, TrackSource};

use crate::core::{LonLat, TrackPoint};
use crate::halt::NotificationId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Viewport the map returns to when the session is cleared
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewPoint {
    pub center: LonLat,
    pub zoom: u8,
}

impl Default for ViewPoint {
    fn default() -> Self {
        Self {
            center: LonLat::new(78.96, 22.0),
            zoom: 5,
        }
    }
}

/// Trait for whatever displays the playback
///
/// The engine pushes updates through this trait only and never touches
/// rendering primitives. Every call must be idempotent and must not call
/// back into the engine:
/// - Map layers (current marker, trail, camera)
/// - Notification toasts for halts
/// - Recording/logging implementations for tests and headless runs
pub trait Renderer: Send {
    /// Draw the vehicle marker at this sample
    fn set_current_position(&mut self, point: &TrackPoint);

    /// Demote a previously current sample into the trail
    fn append_history(&mut self, point: &TrackPoint);

    /// Move the camera to follow the vehicle
    fn pan_to(&mut self, position: LonLat);

    /// Remove the marker and the trail
    fn clear_all(&mut self);

    /// Reset the camera to the default viewport
    fn recenter_default(&mut self, view: ViewPoint);

    /// Create or refresh a notification; it expires after `duration` unless refreshed
    fn notify(&mut self, id: &NotificationId, content: &str, duration: Duration);

    /// Remove a notification
    fn dismiss(&mut self, id: &NotificationId);

    /// Release layer handles when the controller is disposed
    fn release(&mut self) {}
}

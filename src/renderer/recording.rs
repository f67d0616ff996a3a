use crate::core::{LonLat, TrackPoint};
use crate::halt::NotificationId;
use crate::renderer::port::{Renderer, ViewPoint};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One call received by a [`RecordingRenderer`]
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    SetCurrent(TrackPoint),
    AppendHistory(TrackPoint),
    PanTo(LonLat),
    ClearAll,
    RecenterDefault(ViewPoint),
    Notify {
        id: NotificationId,
        content: String,
        duration: Duration,
    },
    Dismiss(NotificationId),
    Release,
}

/// Renderer that records every call instead of drawing
///
/// Clones share the same call log, so a test can keep one handle while the
/// controller owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    calls: Arc<Mutex<Vec<RenderCall>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all calls so far
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Take all recorded calls (for verification)
    pub fn take_calls(&self) -> Vec<RenderCall> {
        self.calls
            .lock()
            .map(|mut c| c.drain(..).collect())
            .unwrap_or_default()
    }

    /// Count calls matching a predicate
    pub fn count(&self, predicate: impl Fn(&RenderCall) -> bool) -> usize {
        self.calls
            .lock()
            .map(|c| c.iter().filter(|call| predicate(call)).count())
            .unwrap_or(0)
    }

    fn record(&self, call: RenderCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Renderer for RecordingRenderer {
    fn set_current_position(&mut self, point: &TrackPoint) {
        self.record(RenderCall::SetCurrent(point.clone()));
    }

    fn append_history(&mut self, point: &TrackPoint) {
        self.record(RenderCall::AppendHistory(point.clone()));
    }

    fn pan_to(&mut self, position: LonLat) {
        self.record(RenderCall::PanTo(position));
    }

    fn clear_all(&mut self) {
        self.record(RenderCall::ClearAll);
    }

    fn recenter_default(&mut self, view: ViewPoint) {
        self.record(RenderCall::RecenterDefault(view));
    }

    fn notify(&mut self, id: &NotificationId, content: &str, duration: Duration) {
        self.record(RenderCall::Notify {
            id: id.clone(),
            content: content.to_string(),
            duration,
        });
    }

    fn dismiss(&mut self, id: &NotificationId) {
        self.record(RenderCall::Dismiss(id.clone()));
    }

    fn release(&mut self) {
        self.record(RenderCall::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VehicleId;

    #[test]
    fn test_clones_share_log() {
        let recorder = RecordingRenderer::new();
        let mut owned = recorder.clone();

        owned.clear_all();
        owned.pan_to(LonLat::new(78.0, 21.0));
        owned.dismiss(&NotificationId::halt(&VehicleId::new("W1")));

        assert_eq!(recorder.calls().len(), 3);
        assert_eq!(recorder.count(|c| matches!(c, RenderCall::ClearAll)), 1);

        let taken = recorder.take_calls();
        assert_eq!(taken[1], RenderCall::PanTo(LonLat::new(78.0, 21.0)));
        assert!(recorder.calls().is_empty());
    }
}

use crate::core::{LonLat, TrackPoint};
use crate::halt::NotificationId;
use crate::renderer::port::{Renderer, ViewPoint};
use std::time::Duration;
use tracing::{debug, info};

/// Headless renderer that writes every update to the log
///
/// Keeps a count of drawn samples so the host can report a summary.
#[derive(Debug, Default)]
pub struct TracingRenderer {
    drawn: usize,
    trail: usize,
}

impl TracingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drawn(&self) -> usize {
        self.drawn
    }

    pub fn trail_len(&self) -> usize {
        self.trail
    }
}

impl Renderer for TracingRenderer {
    fn set_current_position(&mut self, point: &TrackPoint) {
        self.drawn += 1;
        info!(
            "#{} {} {} speed={:.1} km/h{}",
            self.drawn,
            point.timestamp.format("%Y-%m-%d %H:%M:%S"),
            point.position.map(|p| p.to_string()).unwrap_or_default(),
            point.speed_or_zero(),
            if point.is_halted { " [halted]" } else { "" }
        );
    }

    fn append_history(&mut self, point: &TrackPoint) {
        self.trail += 1;
        debug!("Trail += {}", point.timestamp);
    }

    fn pan_to(&mut self, position: LonLat) {
        debug!("Pan to {}", position);
    }

    fn clear_all(&mut self) {
        debug!("Clearing marker and {} trail points", self.trail);
        self.trail = 0;
    }

    fn recenter_default(&mut self, view: ViewPoint) {
        debug!("Recenter on {} zoom {}", view.center, view.zoom);
    }

    fn notify(&mut self, id: &NotificationId, content: &str, duration: Duration) {
        info!("[{}] {} (expires in {}ms)", id, content, duration.as_millis());
    }

    fn dismiss(&mut self, id: &NotificationId) {
        info!("[{}] dismissed", id);
    }

    fn release(&mut self) {
        debug!("Renderer released after {} samples", self.drawn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VehicleId;
    use chrono::NaiveDateTime;

    #[test]
    fn test_counts_drawn_and_trail() {
        let ts = NaiveDateTime::parse_from_str("2023-06-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let point = TrackPoint::new(VehicleId::new("W1"), ts, LonLat::new(77.0, 23.0));
        let mut renderer = TracingRenderer::new();

        renderer.set_current_position(&point);
        renderer.append_history(&point);
        renderer.set_current_position(&point);
        assert_eq!(renderer.drawn(), 2);
        assert_eq!(renderer.trail_len(), 1);

        renderer.clear_all();
        assert_eq!(renderer.trail_len(), 0);
        assert_eq!(renderer.drawn(), 2);
    }
}

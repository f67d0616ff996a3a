use serde::{Deserialize, Serialize};

/// Full scale of the gauge in km/h
pub const GAUGE_MAX: f64 = 160.0;

/// Share of the remaining gap covered per frame
const SMOOTHING: f64 = 0.05;

/// Gaps at or below this snap straight to the target
const SNAP_THRESHOLD: f64 = 0.5;

/// Colour band of the dial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedBand {
    Normal,
    Elevated,
    High,
}

impl SpeedBand {
    pub fn of(speed: f64) -> Self {
        if speed < 60.0 {
            SpeedBand::Normal
        } else if speed < 120.0 {
            SpeedBand::Elevated
        } else {
            SpeedBand::High
        }
    }
}

/// Speedometer needle easing towards the vehicle speed of the latest tick
///
/// The target is pushed in explicitly (usually `PlaybackStatus::vehicle_speed`)
/// and the host calls `frame()` at its own redraw rate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeedGauge {
    target: f64,
    shown: f64,
}

impl SpeedGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the speed the needle should move to; non-finite input reads as 0
    pub fn set_target(&mut self, speed: f64) {
        self.target = if speed.is_finite() { speed } else { 0.0 };
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Advance the needle by one frame and return the shown value
    pub fn frame(&mut self) -> f64 {
        let diff = self.target - self.shown;
        if diff.abs() > SNAP_THRESHOLD {
            self.shown += diff * SMOOTHING;
        } else {
            self.shown = self.target;
        }
        self.shown
    }

    /// Whether further frames would still move the needle
    pub fn is_settled(&self) -> bool {
        self.shown == self.target
    }

    /// Value printed under the dial, clamped to the scale
    pub fn reading(&self) -> u32 {
        self.shown.round().clamp(0.0, GAUGE_MAX) as u32
    }

    pub fn band(&self) -> SpeedBand {
        SpeedBand::of(self.shown)
    }
}

pub mod controller;
pub mod engine;

pub use controller::PlaybackController;
pub use engine::{PlayOutcome, PlaybackEngine, TickOutcome};

use crate::config::{PlaybackSettings, MAX_INTERVAL_MS};
use crate::core::VehicleId;
use crate::halt::HaltEvent;
use crate::stats::DailyStat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Playback phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Playing,
    Paused,
    Finished,
}

/// Multiplier of the base tick interval (2.0 = half speed, 0.5 = double speed)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SpeedFactor(f64);

impl Default for SpeedFactor {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl SpeedFactor {
    pub const NORMAL: Self = Self(1.0);

    /// Slowest accepted factor
    pub const MAX: f64 = 1000.0;

    /// None unless the factor is positive and at most `MAX`; clamped to `floor`
    pub fn new(factor: f64, floor: f64) -> Option<Self> {
        if factor.is_finite() && factor > 0.0 && factor <= Self::MAX {
            Some(Self(factor.max(floor)))
        } else {
            None
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Half the factor (faster playback), never below `floor`
    pub fn halved(self, floor: f64) -> Self {
        Self((self.0 / 2.0).max(floor))
    }

    /// `max(factor * base, min)`, never longer than `MAX_INTERVAL_MS`
    pub fn tick_interval(&self, settings: &PlaybackSettings) -> Duration {
        let ceiling = Duration::from_millis(MAX_INTERVAL_MS);
        let scaled = Duration::try_from_secs_f64(self.0 * settings.base_interval().as_secs_f64()).unwrap_or(ceiling);
        scaled.max(settings.min_interval()).min(ceiling)
    }
}

/// Identity of one scheduled tick; a tick whose id is no longer pending is stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickId(pub u64);

/// The single tick the engine is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTick {
    pub id: TickId,
    pub interval: Duration,
}

/// Snapshot of the session for the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub device: Option<VehicleId>,
    pub cursor: usize,
    pub len: usize,
    pub phase: PlaybackPhase,
    pub speed_factor: f64,
    pub tick_interval: Duration,
    /// Speed of the last drawn sample in km/h
    pub vehicle_speed: f64,
    pub halted: bool,
    /// Bumped whenever the trajectory is replaced or dropped
    pub session: u64,
}

/// Advisory conditions for the host to present; never fatal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlWarning {
    DeviceNotSelected,
    NothingToPlay,
    SourceFailed(String),
}

impl fmt::Display for ControlWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlWarning::DeviceNotSelected => f.write_str("Please select a device first"),
            ControlWarning::NothingToPlay => f.write_str("Nothing to play for the selected device"),
            ControlWarning::SourceFailed(msg) => write!(f, "Could not load track points: {}", msg),
        }
    }
}

/// Outputs pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    DeviceSelected(VehicleId),
    TrajectoryLoaded {
        device: Option<VehicleId>,
        points: usize,
    },
    PhaseChanged(PlaybackPhase),
    CursorAdvanced {
        cursor: usize,
        vehicle_speed: f64,
    },
    PointSkipped {
        index: usize,
    },
    SpeedChanged {
        factor: f64,
        interval: Duration,
    },
    DailyStats(Vec<DailyStat>),
    Halt(HaltEvent),
    Warning(ControlWarning),
}

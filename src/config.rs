use crate::renderer::ViewPoint;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Hard floor of the tick interval
pub const MIN_INTERVAL_FLOOR_MS: u64 = 500;

/// Longest tick interval (one hour)
pub const MAX_INTERVAL_MS: u64 = 3_600_000;

/// Largest factor "slow" may be configured with
const MAX_SLOW_FACTOR: f64 = 1000.0;

/// Persistent playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Tick interval at speed factor 1
    pub base_interval_ms: u64,
    /// Lower bound of the tick interval (no more than 2 redraws per second)
    pub min_interval_ms: u64,
    /// Factor set by "slow"
    pub slow_factor: f64,
    /// Smallest factor reachable with "fast"
    pub fast_floor: f64,
    /// Added to the tick interval to get the halt notification lifetime
    pub notification_grace_ms: u64,
    /// Where "clear" recenters the map
    pub default_view: ViewPoint,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            base_interval_ms: 1000,
            min_interval_ms: 500,
            slow_factor: 2.0,
            fast_floor: 0.125,
            notification_grace_ms: 200,
            default_view: ViewPoint::default(),
        }
    }
}

impl PlaybackSettings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("wagon-playback").join("settings.json"))
    }

    /// Load from the user config dir, falling back to defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(settings) => return settings,
                    Err(e) => warn!("Ignoring settings at {}: {:#}", path.display(), e),
                }
            }
        }
        Self::default()
    }

    /// Load from an explicit file, reporting any error
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(settings.sanitized())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("No config directory on this platform")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Replace nonsensical values with the defaults
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.base_interval_ms == 0 {
            self.base_interval_ms = defaults.base_interval_ms;
        }
        self.base_interval_ms = self.base_interval_ms.min(MAX_INTERVAL_MS);
        // The interval may be raised, never lowered below two redraws per second
        self.min_interval_ms = self.min_interval_ms.clamp(MIN_INTERVAL_FLOOR_MS, MAX_INTERVAL_MS);
        if !(self.slow_factor.is_finite() && self.slow_factor > 0.0 && self.slow_factor <= MAX_SLOW_FACTOR) {
            self.slow_factor = defaults.slow_factor;
        }
        if !(self.fast_floor.is_finite() && self.fast_floor > 0.0) {
            self.fast_floor = defaults.fast_floor;
        }
        if !self.default_view.center.is_valid() {
            self.default_view = defaults.default_view;
        }
        self
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn notification_grace(&self) -> Duration {
        Duration::from_millis(self.notification_grace_ms)
    }
}

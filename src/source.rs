use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::core::{TimeRange, TrackPoint, VehicleId};
use crate::error::{PlaybackError, PlaybackResult};
use crate::input;

/// Trait for wherever recorded track points come from
///
/// The controller only ever asks two questions:
/// - Which vehicles reported inside a time range
/// - The ordered samples of one vehicle inside that range
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Devices with at least one sample inside `range`
    async fn device_ids(&self, range: TimeRange) -> PlaybackResult<Vec<VehicleId>>;

    /// Samples of `device` inside `range`, in recording order
    async fn track_points(&self, device: &VehicleId, range: TimeRange) -> PlaybackResult<Vec<TrackPoint>>;
}

/// Source backed by an exported CSV or JSON file held in memory
#[derive(Debug, Clone, Default)]
pub struct FileTrackSource {
    points: Vec<TrackPoint>,
}

impl FileTrackSource {
    /// Load and keep every sample of an export
    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::from_points(input::load_file(path)?))
    }

    pub fn from_points(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Range covering every sample, if there are any
    pub fn full_range(&self) -> Option<TimeRange> {
        let from = self.points.iter().map(|p| p.timestamp).min()?;
        let to = self.points.iter().map(|p| p.timestamp).max()?;
        Some(TimeRange::new(from, to))
    }
}

#[async_trait]
impl TrackSource for FileTrackSource {
    async fn device_ids(&self, range: TimeRange) -> PlaybackResult<Vec<VehicleId>> {
        let ids: BTreeSet<&VehicleId> = self
            .points
            .iter()
            .filter(|p| range.contains(p.timestamp))
            .map(|p| &p.vehicle_id)
            .collect();
        Ok(ids.into_iter().cloned().collect())
    }

    async fn track_points(&self, device: &VehicleId, range: TimeRange) -> PlaybackResult<Vec<TrackPoint>> {
        if range.from > range.to {
            return Err(PlaybackError::Source(format!(
                "Empty time range {} .. {}",
                range.from, range.to
            )));
        }
        Ok(self
            .points
            .iter()
            .filter(|p| &p.vehicle_id == device && range.contains(p.timestamp))
            .cloned()
            .collect())
    }
}

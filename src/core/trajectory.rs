use crate::core::{TrackPoint, VehicleId};
use chrono::NaiveDateTime;
use tracing::warn;

/// Ordered samples of one vehicle for one selected time range
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    // Timestamps are expected to be non-decreasing, but nothing relies on it for correctness
    points: Vec<TrackPoint>,
}

impl Trajectory {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        let trajectory = Self { points };
        let out_of_order = trajectory.out_of_order_count();
        if out_of_order > 0 {
            warn!(
                "Trajectory has {} out-of-order samples (of {})",
                out_of_order,
                trajectory.len()
            );
        }
        trajectory
    }

    pub fn empty() -> Self {
        Self { points: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackPoint> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// Vehicle of the first sample
    pub fn vehicle(&self) -> Option<&VehicleId> {
        self.points.first().map(|p| &p.vehicle_id)
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.points.last().map(|p| p.timestamp)
    }

    /// Number of adjacent pairs whose timestamps go backwards
    pub fn out_of_order_count(&self) -> usize {
        self.points
            .windows(2)
            .filter(|pair| pair[0].timestamp > pair[1].timestamp)
            .count()
    }

    /// Number of samples without a drawable position
    pub fn invalid_position_count(&self) -> usize {
        self.points
            .iter()
            .filter(|p| p.valid_position().is_none())
            .count()
    }
}

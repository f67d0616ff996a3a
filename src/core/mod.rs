pub mod point;
pub mod trajectory;

pub use point::{LonLat, StationInfo, TimeRange, TrackPoint, VehicleId};
pub use trajectory::Trajectory;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tracked vehicle (the device id reported by the tracker)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Check the position can be drawn: finite and inside the degree ranges
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl fmt::Display for LonLat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lon, self.lat)
    }
}

/// Nearest-station metadata attached to a sample, only used for display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationInfo {
    pub name: String,
    /// Distance to the station in km
    pub distance: Option<f64>,
    pub zone: Option<String>,
    pub division: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
}

impl StationInfo {
    /// One-line description, e.g. "ITARSI JN (2.40 km), WCR/BPL, Madhya Pradesh"
    pub fn describe(&self) -> String {
        let mut out = self.name.clone();
        if let Some(distance) = self.distance {
            out.push_str(&format!(" ({:.2} km)", distance));
        }

        let region: Vec<&str> = [&self.zone, &self.division]
            .iter()
            .filter_map(|s| s.as_deref())
            .collect();
        if !region.is_empty() {
            out.push_str(", ");
            out.push_str(&region.join("/"));
        }

        let place: Vec<&str> = [&self.district, &self.state]
            .iter()
            .filter_map(|s| s.as_deref())
            .collect();
        if !place.is_empty() {
            out.push_str(", ");
            out.push_str(&place.join(", "));
        }
        out
    }
}

/// One recorded GPS sample of a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Position, absent when the tracker reported nothing usable
    pub position: Option<LonLat>,

    /// Device-local sample time
    pub timestamp: NaiveDateTime,

    /// Instantaneous speed in km/h
    pub speed: Option<f64>,

    /// Part of a long halt
    pub is_halted: bool,

    pub vehicle_id: VehicleId,

    /// Distance covered since the previous sample, in km
    pub distance: Option<f64>,

    /// Time elapsed since the previous sample, in hours
    pub time: Option<f64>,

    pub station: Option<StationInfo>,
}

impl TrackPoint {
    /// Create a moving sample with no aggregation fields
    pub fn new(vehicle_id: VehicleId, timestamp: NaiveDateTime, position: LonLat) -> Self {
        Self {
            position: Some(position),
            timestamp,
            speed: None,
            is_halted: false,
            vehicle_id,
            distance: None,
            time: None,
            station: None,
        }
    }

    /// The position if it can be rendered
    pub fn valid_position(&self) -> Option<LonLat> {
        self.position.filter(LonLat::is_valid)
    }

    /// Calendar day of the sample
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Speed with missing values read as 0
    pub fn speed_or_zero(&self) -> f64 {
        self.speed.filter(|s| s.is_finite()).unwrap_or(0.0)
    }
}

/// Inclusive time window used when asking a data source for points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl TimeRange {
    pub fn new(from: NaiveDateTime, to: NaiveDateTime) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t >= self.from && t <= self.to
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use crate::core::{LonLat, StationInfo, TrackPoint, VehicleId};

/// Timestamp layouts accepted on the wire, tried in order
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y/%m/%d %H:%M:%S%.f"];

/// A scalar the exporter may have written as a number, a string or a bool
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Lenient {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl Lenient {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Lenient::Number(n) => Some(*n),
            Lenient::Flag(_) => None,
            Lenient::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Lenient::Flag(b) => Some(*b),
            Lenient::Number(n) => Some(*n != 0.0),
            Lenient::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => Some(true),
                "false" | "0" | "no" | "n" | "" => Some(false),
                _ => None,
            },
        }
    }
}

/// One sample as exported by the tracking API, before validation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoint {
    #[serde(alias = "lng", alias = "longitude")]
    pub lon: Option<Lenient>,
    #[serde(alias = "latitude")]
    pub lat: Option<Lenient>,
    #[serde(alias = "datetime", alias = "date_time", alias = "timestamp")]
    pub date_time: Option<String>,
    pub speed: Option<Lenient>,
    #[serde(alias = "is_halted", alias = "halted")]
    pub is_halted: Option<Lenient>,
    #[serde(rename = "device_id", alias = "deviceId", alias = "vehicleId", alias = "vehicle_id")]
    pub device_id: Option<String>,
    pub distance: Option<Lenient>,
    pub time: Option<Lenient>,
    #[serde(alias = "station_name")]
    pub station_name: Option<String>,
    #[serde(alias = "station_distance")]
    pub station_distance: Option<Lenient>,
    pub zone: Option<String>,
    pub division: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
}

impl RawPoint {
    /// Validate into a track point
    ///
    /// Unusable coordinates become an absent position (skipped at playback);
    /// a missing or unparseable timestamp rejects the sample.
    pub fn into_track_point(self, default_device: &VehicleId) -> Result<TrackPoint> {
        let raw_time = self.date_time.as_deref().context("Missing dateTime")?;
        let timestamp = parse_timestamp(raw_time)?;

        let position = match (
            self.lon.as_ref().and_then(Lenient::as_f64),
            self.lat.as_ref().and_then(Lenient::as_f64),
        ) {
            (Some(lon), Some(lat)) => Some(LonLat::new(lon, lat)),
            _ => None,
        };

        let vehicle_id = self
            .device_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| VehicleId::new(id.trim()))
            .unwrap_or_else(|| default_device.clone());

        let station = non_empty(self.station_name).map(|name| StationInfo {
            name,
            distance: self.station_distance.as_ref().and_then(Lenient::as_f64),
            zone: non_empty(self.zone),
            division: non_empty(self.division),
            state: non_empty(self.state),
            district: non_empty(self.district),
        });

        Ok(TrackPoint {
            position,
            timestamp,
            speed: self.speed.as_ref().and_then(Lenient::as_f64),
            is_halted: self.is_halted.as_ref().and_then(Lenient::as_bool).unwrap_or(false),
            vehicle_id,
            distance: self.distance.as_ref().and_then(Lenient::as_f64),
            time: self.time.as_ref().and_then(Lenient::as_f64),
            station,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a device-local timestamp; zoned ISO-8601 input keeps its local wall time
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.naive_local())
        .with_context(|| format!("Invalid timestamp: {:?}", raw))
}

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

use crate::core::{TrackPoint, VehicleId};
use crate::input::raw::{Lenient, RawPoint};

/// Load track points from a CSV export
///
/// Supports flexible column names:
/// - lon,lat,dateTime,speed,isHalted,device_id
/// - longitude,latitude,timestamp,...
/// - plus optional distance,time and station columns
///
/// Only the timestamp column is required.
pub fn load_csv(path: &str, default_device: &VehicleId) -> Result<Vec<TrackPoint>> {
    let rdr = csv::Reader::from_path(Path::new(path)).with_context(|| format!("Failed to open {}", path))?;
    read_points(rdr, default_device).with_context(|| format!("Failed to load {}", path))
}

pub fn parse_csv(data: &[u8], default_device: &VehicleId) -> Result<Vec<TrackPoint>> {
    read_points(csv::Reader::from_reader(data), default_device)
}

fn read_points<R: Read>(mut rdr: csv::Reader<R>, default_device: &VehicleId) -> Result<Vec<TrackPoint>> {
    let columns = Columns::detect(rdr.headers()?)?;

    let mut points = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.context("Failed to read CSV row")?;
        let point = columns
            .raw_point(&record)
            .into_track_point(default_device)
            .with_context(|| format!("Bad track point on row {}", row + 1))?;
        points.push(point);
    }

    Ok(points)
}

/// Column indices detected from the header row
struct Columns {
    lon: Option<usize>,
    lat: Option<usize>,
    date_time: usize,
    speed: Option<usize>,
    is_halted: Option<usize>,
    device_id: Option<usize>,
    distance: Option<usize>,
    time: Option<usize>,
    station_name: Option<usize>,
    station_distance: Option<usize>,
    zone: Option<usize>,
    division: Option<usize>,
    state: Option<usize>,
    district: Option<usize>,
}

impl Columns {
    fn detect(headers: &csv::StringRecord) -> Result<Self> {
        Ok(Self {
            lon: find_optional(headers, &["lon", "lng", "longitude"]),
            lat: find_optional(headers, &["lat", "latitude"]),
            date_time: find_column(headers, &["datetime", "date_time", "timestamp"])?,
            speed: find_optional(headers, &["speed", "speed_kmh"]),
            is_halted: find_optional(headers, &["ishalted", "is_halted", "halted"]),
            device_id: find_optional(headers, &["device_id", "deviceid", "vehicleid", "vehicle_id"]),
            distance: find_optional(headers, &["distance"]),
            time: find_optional(headers, &["time", "totaltime"]),
            station_name: find_optional(headers, &["stationname", "station_name", "station"]),
            station_distance: find_optional(headers, &["stationdistance", "station_distance"]),
            zone: find_optional(headers, &["zone"]),
            division: find_optional(headers, &["division"]),
            state: find_optional(headers, &["state"]),
            district: find_optional(headers, &["district"]),
        })
    }

    fn raw_point(&self, record: &csv::StringRecord) -> RawPoint {
        let text = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let value = |idx: Option<usize>| text(idx).map(Lenient::Text);

        RawPoint {
            lon: value(self.lon),
            lat: value(self.lat),
            date_time: text(Some(self.date_time)),
            speed: value(self.speed),
            is_halted: value(self.is_halted),
            device_id: text(self.device_id),
            distance: value(self.distance),
            time: value(self.time),
            station_name: text(self.station_name),
            station_distance: value(self.station_distance),
            zone: text(self.zone),
            division: text(self.division),
            state: text(self.state),
            district: text(self.district),
        }
    }
}

/// Find a column by checking possible names
fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize> {
    find_optional(headers, names).with_context(|| format!("Could not find column with names: {:?}", names))
}

fn find_optional(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let header_lower = header.trim().to_lowercase();
        names.iter().any(|&name| header_lower == name)
    })
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::core::{TrackPoint, VehicleId};
use crate::input::raw::RawPoint;

/// Either a bare array of samples or the API response wrapping one
#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Points(Vec<RawPoint>),
    Wrapped {
        #[serde(alias = "trackPoints", alias = "track_points", alias = "data")]
        points: Vec<RawPoint>,
    },
}

/// Load track points from a JSON export of the tracking API
///
/// Samples without a device id are attributed to `default_device`.
pub fn load_json(path: &str, default_device: &VehicleId) -> Result<Vec<TrackPoint>> {
    let data = std::fs::read(Path::new(path)).with_context(|| format!("Failed to read {}", path))?;
    parse_json(&data, default_device).with_context(|| format!("Failed to load {}", path))
}

pub fn parse_json(data: &[u8], default_device: &VehicleId) -> Result<Vec<TrackPoint>> {
    let document: Document = serde_json::from_slice(data).context("Not a track point document")?;
    let raw = match document {
        Document::Points(points) | Document::Wrapped { points } => points,
    };

    raw.into_iter()
        .enumerate()
        .map(|(index, point)| {
            point
                .into_track_point(default_device)
                .with_context(|| format!("Bad track point at index {}", index))
        })
        .collect()
}

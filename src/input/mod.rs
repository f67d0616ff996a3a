pub mod csv;
pub mod json;
pub mod raw;

pub use self::csv::load_csv;
pub use self::json::load_json;
pub use self::raw::parse_timestamp;

use anyhow::Result;
use std::path::Path;

use crate::core::{TrackPoint, VehicleId};

/// Input format detection result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Csv,
    Unknown,
}

/// Detect the format of an input file by looking at its first bytes
pub fn detect_format(data: &[u8]) -> InputFormat {
    if is_json(data) {
        return InputFormat::Json;
    }

    if is_csv(data) {
        return InputFormat::Csv;
    }

    InputFormat::Unknown
}

fn is_json(data: &[u8]) -> bool {
    matches!(
        data.iter().find(|b| !b.is_ascii_whitespace()),
        Some(b'[') | Some(b'{')
    )
}

fn is_csv(data: &[u8]) -> bool {
    // Look for a header line with commas in the first 500 bytes
    if data.len() < 10 {
        return false;
    }

    match std::str::from_utf8(&data[..data.len().min(500)]) {
        Ok(text) => text.lines().take(5).any(|line| line.chars().filter(|&c| c == ',').count() >= 2),
        // The sample may end inside a multi-byte character
        Err(e) => e.valid_up_to() > 0 && data[..e.valid_up_to()].contains(&b','),
    }
}

/// Device id for samples that carry none: the file name without extension
pub fn default_device(path: &str) -> VehicleId {
    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    VehicleId::new(stem)
}

/// Load track points from a file, auto-detecting format
pub fn load_file(path: &str) -> Result<Vec<TrackPoint>> {
    let data = std::fs::read(path)?;
    let device = default_device(path);

    match detect_format(&data) {
        InputFormat::Json => load_json(path, &device),
        InputFormat::Csv => load_csv(path, &device),
        InputFormat::Unknown => anyhow::bail!("Unknown input format: {}", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(b"  [{\"lon\": 1}]"), InputFormat::Json);
        assert_eq!(detect_format(b"lon,lat,dateTime\n1,2,3"), InputFormat::Csv);
        assert_eq!(detect_format(b"\x00\x01"), InputFormat::Unknown);
    }

    #[test]
    fn test_load_file_uses_stem_as_device() {
        let dir = std::env::temp_dir().join(format!("wagon-playback-input-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("WAGON-42.csv");
        std::fs::write(&path, "lon,lat,dateTime\n77.0,23.0,2023-06-01 10:00:00\n").unwrap();

        let points = load_file(path.to_str().unwrap()).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].vehicle_id, VehicleId::new("WAGON-42"));
        let _ = std::fs::remove_file(&path);
    }
}

use crate::core::TrackPoint;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Movement summary for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub day: NaiveDate,
    /// Summed distance in km
    pub distance: f64,
    /// Summed time in hours
    pub time: f64,
    /// Mean speed of the moving samples in km/h
    pub avg_speed: f64,
}

/// Running sums for one day
#[derive(Clone, Default)]
struct DayAccumulator {
    distance: f64,
    time: f64,
    total_speed: f64,
    moving_count: usize,
}

impl DayAccumulator {
    fn add(&mut self, point: &TrackPoint) {
        self.distance += point.distance.filter(|d| d.is_finite()).unwrap_or(0.0);
        self.time += point.time.filter(|t| t.is_finite()).unwrap_or(0.0);

        // Halted samples count towards distance/time, never towards the speed average
        if !point.is_halted {
            self.total_speed += point.speed_or_zero();
            self.moving_count += 1;
        }
    }

    fn avg_speed(&self) -> f64 {
        if self.moving_count == 0 {
            0.0
        } else {
            self.total_speed / self.moving_count as f64
        }
    }
}

/// Group samples by calendar day and summarize each day, ordered by day
pub fn aggregate_daily(points: &[TrackPoint]) -> Vec<DailyStat> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for point in points {
        days.entry(point.day()).or_default().add(point);
    }

    days.into_iter()
        .map(|(day, acc)| DailyStat {
            day,
            distance: acc.distance,
            time: acc.time,
            avg_speed: acc.avg_speed(),
        })
        .collect()
}

/// Render the stats as a plain-text table with two decimals per value
pub fn format_table(stats: &[DailyStat]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:>14} {:>16} {:>17}\n",
        "Date", "Distance (km)", "Total Time (hr)", "Avg Speed (km/h)"
    ));
    for row in stats {
        out.push_str(&format!(
            "{:<12} {:>14.2} {:>16.2} {:>17.2}\n",
            row.day.format("%Y-%m-%d").to_string(),
            row.distance,
            row.time,
            row.avg_speed
        ));
    }
    out
}

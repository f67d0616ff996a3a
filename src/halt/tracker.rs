use crate::core::{StationInfo, TrackPoint, VehicleId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Identity of a notification shown by the host; updates reuse the same id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    /// The single halt notification of a vehicle
    pub fn halt(vehicle: &VehicleId) -> Self {
        Self(format!("halt:{}", vehicle))
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Elapsed halt time in whole minutes, measured on sample timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HaltDuration {
    pub total_minutes: i64,
}

impl HaltDuration {
    pub const ZERO: Self = Self { total_minutes: 0 };

    pub fn between(start: NaiveDateTime, last: NaiveDateTime) -> Self {
        Self {
            total_minutes: (last - start).num_minutes().max(0),
        }
    }

    pub fn hours(&self) -> i64 {
        self.total_minutes / 60
    }

    pub fn minutes(&self) -> i64 {
        self.total_minutes % 60
    }
}

impl fmt::Display for HaltDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total_minutes == 0 {
            f.write_str("0")
        } else if self.hours() == 0 {
            write!(f, "{} min", self.minutes())
        } else {
            write!(f, "{} hr {} min", self.hours(), self.minutes())
        }
    }
}

/// A run of consecutive halted samples being traversed
#[derive(Debug, Clone, PartialEq)]
pub struct HaltSession {
    pub start_timestamp: NaiveDateTime,
    pub last_timestamp: NaiveDateTime,
}

impl HaltSession {
    pub fn duration(&self) -> HaltDuration {
        HaltDuration::between(self.start_timestamp, self.last_timestamp)
    }
}

/// Content of the halt notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltNotice {
    pub id: NotificationId,
    pub vehicle: VehicleId,
    pub started_at: NaiveDateTime,
    pub duration: HaltDuration,
    pub station: Option<StationInfo>,
}

impl HaltNotice {
    pub fn message(&self) -> String {
        let mut msg = format!(
            "{} halted since {} for {}",
            self.vehicle,
            self.started_at.format("%Y-%m-%d %H:%M"),
            self.duration
        );
        if let Some(station) = &self.station {
            msg.push_str(" near ");
            msg.push_str(&station.describe());
        }
        msg
    }
}

/// Lifecycle change produced by one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HaltEvent {
    /// First halted sample of a run
    Started(HaltNotice),
    /// Further halted sample, same notification identity
    Updated(HaltNotice),
    /// The run ended; the notification must be dismissed
    Ended {
        id: NotificationId,
        duration: HaltDuration,
    },
}

impl HaltEvent {
    pub fn id(&self) -> &NotificationId {
        match self {
            HaltEvent::Started(notice) | HaltEvent::Updated(notice) => &notice.id,
            HaltEvent::Ended { id, .. } => id,
        }
    }
}

/// Turns consecutive halted samples into one notification lifecycle
#[derive(Debug, Default)]
pub struct HaltTracker {
    session: Option<HaltSession>,
    notification: Option<NotificationId>,
}

impl HaltTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&HaltSession> {
        self.session.as_ref()
    }

    /// Feed the next sample in trajectory order
    pub fn observe(&mut self, point: &TrackPoint) -> Option<HaltEvent> {
        if !point.is_halted {
            return self.end();
        }

        match self.session.as_mut() {
            None => {
                let id = NotificationId::halt(&point.vehicle_id);
                debug!("Halt started for {} at {}", point.vehicle_id, point.timestamp);
                self.session = Some(HaltSession {
                    start_timestamp: point.timestamp,
                    last_timestamp: point.timestamp,
                });
                self.notification = Some(id.clone());
                Some(HaltEvent::Started(HaltNotice {
                    id,
                    vehicle: point.vehicle_id.clone(),
                    started_at: point.timestamp,
                    duration: HaltDuration::ZERO,
                    station: point.station.clone(),
                }))
            }
            Some(session) => {
                session.last_timestamp = point.timestamp;
                let started_at = session.start_timestamp;
                let duration = session.duration();
                let id = self
                    .notification
                    .get_or_insert_with(|| NotificationId::halt(&point.vehicle_id))
                    .clone();
                Some(HaltEvent::Updated(HaltNotice {
                    id,
                    vehicle: point.vehicle_id.clone(),
                    started_at,
                    duration,
                    station: point.station.clone(),
                }))
            }
        }
    }

    /// Drop any active session, returning the dismissal if there was one
    pub fn reset(&mut self) -> Option<HaltEvent> {
        self.end()
    }

    fn end(&mut self) -> Option<HaltEvent> {
        let session = self.session.take()?;
        let id = self.notification.take()?;
        let duration = session.duration();
        debug!("Halt ended after {}", duration);
        Some(HaltEvent::Ended { id, duration })
    }
}

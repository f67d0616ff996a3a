pub mod tracker;

pub use tracker::{HaltDuration, HaltEvent, HaltNotice, HaltSession, HaltTracker, NotificationId};

//! Attendance workflow: roll-call state, transmission stages, sent-message log

pub mod controller;
pub mod notification_log;
pub mod stage;

pub use controller::{AttendanceController, MarkOutcome, RollCallSummary, RosterStore, SqliteRoster};
pub use notification_log::NotificationLog;
pub use stage::StageStore;

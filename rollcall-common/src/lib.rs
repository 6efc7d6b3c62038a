//! # Roll-Call Common Library
//!
//! Shared code for the roll-call services including:
//! - Domain models (students, attendance, notification log entries)
//! - SQLite schema and directory/attendance stores
//! - Event types and the broadcast EventBus
//! - Configuration loading
//! - Clock abstraction for timestamps and timers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, ManualClock, SystemClock};

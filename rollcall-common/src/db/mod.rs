//! Database access layer
//!
//! SQLite schema plus the student directory and attendance record stores.
//! All durable state lives here; workflow stages and the notification log
//! are in-memory only.

pub mod attendance;
pub mod init;
pub mod students;

pub use init::{init_database, init_in_memory, init_schema};

//! Attendance record store
//!
//! Append-only: one row per mark, never updated or deleted.

use crate::models::{AttendanceRecord, AttendanceStatus};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Append an attendance record for an existing student
pub async fn record_attendance(
    pool: &SqlitePool,
    student_id: &str,
    status: AttendanceStatus,
    timestamp: DateTime<Utc>,
) -> Result<AttendanceRecord> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM students WHERE id = ?")
        .bind(student_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("Student not found: {}", student_id)));
    }

    let record = AttendanceRecord {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        status,
        timestamp,
    };

    sqlx::query("INSERT INTO attendance (id, student_id, status, timestamp) VALUES (?, ?, ?, ?)")
        .bind(&record.id)
        .bind(&record.student_id)
        .bind(record.status.as_str())
        .bind(record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(pool)
        .await?;

    tracing::debug!(student_id = %student_id, status = %status, "Attendance recorded");

    Ok(record)
}

/// All records for one student, oldest first
pub async fn list_for_student(pool: &SqlitePool, student_id: &str) -> Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(
        "SELECT id, student_id, status, timestamp FROM attendance WHERE student_id = ? ORDER BY timestamp",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<AttendanceRecord> {
            let status: String = row.get("status");
            let timestamp: String = row.get("timestamp");
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| Error::Internal(format!("Failed to parse timestamp: {}", e)))?
                .with_timezone(&Utc);

            Ok(AttendanceRecord {
                id: row.get("id"),
                student_id: row.get("student_id"),
                status: status.parse()?,
                timestamp,
            })
        })
        .collect()
}

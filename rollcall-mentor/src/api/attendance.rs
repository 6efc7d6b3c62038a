//! Direct attendance persistence
//!
//! POST /api/attendance appends one record without touching the roll-call
//! workflow (no stage, no SMS).

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use rollcall_common::db;
use rollcall_common::models::{AttendanceRecord, AttendanceStatus};
use rollcall_common::time;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Body shared by `/api/attendance` and `/api/roll-call/mark`
///
/// Fields are optional so a missing one is a 400, not a deserializer reject.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub student_id: Option<String>,
    pub status: Option<String>,
}

impl AttendanceRequest {
    pub fn validate(self) -> ApiResult<(String, AttendanceStatus)> {
        let student_id = self.student_id.filter(|id| !id.trim().is_empty());
        let status = self.status.filter(|s| !s.trim().is_empty());

        let (Some(student_id), Some(status)) = (student_id, status) else {
            return Err(ApiError::BadRequest(
                "Student ID and status are required".to_string(),
            ));
        };

        let status = status
            .parse::<AttendanceStatus>()
            .map_err(|_| ApiError::BadRequest(format!("Invalid status: {}", status)))?;

        Ok((student_id, status))
    }
}

#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    pub success: bool,
    pub record: AttendanceRecord,
}

/// POST /api/attendance
pub async fn record_attendance(
    State(state): State<AppState>,
    body: Result<Json<AttendanceRequest>, JsonRejection>,
) -> ApiResult<Json<AttendanceResponse>> {
    let Json(request) = body?;
    let (student_id, status) = request.validate()?;

    let record = db::attendance::record_attendance(&state.db, &student_id, status, time::now()).await?;

    Ok(Json(AttendanceResponse {
        success: true,
        record,
    }))
}

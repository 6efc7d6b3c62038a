//! Roll-call workflow endpoints
//!
//! POST /api/roll-call/mark   apply a status and run the workflow (202)
//! GET  /api/roll-call        statuses, stages and counts
//! GET  /api/notifications    sent-message log, newest first

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use rollcall_common::models::{AttendanceStatus, NotificationLogEntry, TransmissionStage};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use super::attendance::AttendanceRequest;
use super::students::require_student;
use crate::error::ApiResult;
use crate::workflow::RollCallSummary;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkResponse {
    pub student_id: String,
    pub status: AttendanceStatus,
    /// False when the student already had this status
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct RollCallResponse {
    pub statuses: HashMap<String, AttendanceStatus>,
    pub stages: HashMap<String, TransmissionStage>,
    pub summary: RollCallSummary,
}

/// POST /api/roll-call/mark
pub async fn mark(
    State(state): State<AppState>,
    body: Result<Json<AttendanceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MarkResponse>)> {
    let Json(request) = body?;
    let (student_id, status) = request.validate()?;
    require_student(&state, &student_id).await?;

    // The spawned task is detached; its outcome is visible through stages and events
    let changed = state.controller.begin(&student_id, status).is_some();
    debug!(student_id = %student_id, status = %status, changed, "Roll-call mark accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(MarkResponse {
            student_id,
            status,
            changed,
        }),
    ))
}

/// GET /api/roll-call
pub async fn roll_call(State(state): State<AppState>) -> Json<RollCallResponse> {
    Json(RollCallResponse {
        statuses: state.controller.statuses(),
        stages: state.controller.stages().snapshot().await,
        summary: state.controller.summary(),
    })
}

/// GET /api/notifications
pub async fn notifications(State(state): State<AppState>) -> Json<Vec<NotificationLogEntry>> {
    Json(state.controller.notification_log().entries().await)
}

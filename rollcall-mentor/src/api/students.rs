//! Student directory endpoints
//!
//! GET  /api/students                   full roster with academic details
//! POST /api/add-student                intake (201, 400, 409)
//! PUT  /api/update-student?id=...      name and phone edits (400, 404)
//! GET  /api/students/:id/insights      generated performance summary
//! GET  /api/students/:id/attendance    attendance history

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use rollcall_common::db;
use rollcall_common::models::{AttendanceRecord, NewStudent, Student, StudentUpdate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::services::StudentSnapshot;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub success: bool,
    pub student: Student,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

/// Update body; `id` may come from the query string instead
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudentRequest {
    pub id: Option<String>,
    #[serde(flatten)]
    pub update: StudentUpdate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightResponse {
    pub student_id: String,
    pub insight: String,
}

/// GET /api/students
pub async fn list_students(State(state): State<AppState>) -> ApiResult<Json<Vec<Student>>> {
    let students = db::students::list_students(&state.db).await?;
    Ok(Json(students))
}

/// POST /api/add-student
pub async fn add_student(
    State(state): State<AppState>,
    body: Result<Json<NewStudent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StudentResponse>)> {
    let Json(intake) = body?;
    let student = db::students::create_student(&state.db, &intake).await?;

    info!(student_id = %student.id, roll_number = %student.roll_number, "Student added");
    Ok((
        StatusCode::CREATED,
        Json(StudentResponse {
            success: true,
            student,
        }),
    ))
}

/// PUT /api/update-student
pub async fn update_student(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
    body: Result<Json<UpdateStudentRequest>, JsonRejection>,
) -> ApiResult<Json<StudentResponse>> {
    let Query(query) = query?;
    let Json(request) = body?;

    let id = query
        .id
        .or(request.id)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Student ID is required".to_string()))?;

    let student = db::students::update_student(&state.db, &id, &request.update).await?;

    info!(student_id = %id, "Student updated");
    Ok(Json(StudentResponse {
        success: true,
        student,
    }))
}

/// GET /api/students/:id/insights
pub async fn student_insights(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<InsightResponse>> {
    let student = require_student(&state, &id).await?;
    let insight = state
        .composer
        .performance_insight(&StudentSnapshot::from(&student))
        .await;

    Ok(Json(InsightResponse {
        student_id: id,
        insight,
    }))
}

/// GET /api/students/:id/attendance
pub async fn student_attendance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<AttendanceRecord>>> {
    require_student(&state, &id).await?;
    let records = db::attendance::list_for_student(&state.db, &id).await?;
    Ok(Json(records))
}

pub(crate) async fn require_student(state: &AppState, id: &str) -> ApiResult<Student> {
    db::students::find_student(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))
}

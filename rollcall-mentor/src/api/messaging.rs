//! Composer and Dispatcher endpoints
//!
//! POST /api/compose           draft an absence message (text/plain)
//! POST /api/send-sms          relay one message through the gateway
//! POST /api/request-details   ask a student for updated academic details

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use rollcall_common::models::Recipient;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::students::require_student;
use crate::error::{ApiError, ApiResult};
use crate::services::StudentSnapshot;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    pub student: StudentSnapshot,
    pub recipient: Recipient,
}

#[derive(Debug, Deserialize)]
pub struct SendSmsRequest {
    pub phone: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetailsRequest {
    pub student_id: Option<String>,
    /// Pre-written text; drafted by the composer when absent
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendSmsResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct RequestDetailsResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/compose
pub async fn compose(
    State(state): State<AppState>,
    body: Result<Json<ComposeRequest>, JsonRejection>,
) -> ApiResult<String> {
    let Json(request) = body?;
    if request.student.name.trim().is_empty() || request.student.roll_number.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Student name and roll number are required".to_string(),
        ));
    }

    Ok(state
        .composer
        .draft_absence(&request.student, request.recipient)
        .await)
}

/// POST /api/send-sms
pub async fn send_sms(
    State(state): State<AppState>,
    body: Result<Json<SendSmsRequest>, JsonRejection>,
) -> ApiResult<Json<SendSmsResponse>> {
    let Json(request) = body?;
    let phone = request.phone.filter(|p| !p.trim().is_empty());
    let message = request.message.filter(|m| !m.trim().is_empty());

    let (Some(phone), Some(message)) = (phone, message) else {
        return Err(ApiError::BadRequest("Phone and message are required".to_string()));
    };

    state.dispatcher.send(&phone, &message).await?;

    Ok(Json(SendSmsResponse { success: true }))
}

/// POST /api/request-details
pub async fn request_details(
    State(state): State<AppState>,
    body: Result<Json<RequestDetailsRequest>, JsonRejection>,
) -> ApiResult<Json<RequestDetailsResponse>> {
    let Json(request) = body?;
    let student_id = request
        .student_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Student ID is required".to_string()))?;

    let student = require_student(&state, &student_id).await?;
    let message = match request.message.filter(|m| !m.trim().is_empty()) {
        Some(message) => message,
        None => {
            state
                .composer
                .details_request(&StudentSnapshot::from(&student))
                .await
        }
    };

    state.dispatcher.send(&student.student_phone, &message).await?;
    info!(student_id = %student_id, "Academic details requested");

    Ok(Json(RequestDetailsResponse {
        success: true,
        message,
    }))
}

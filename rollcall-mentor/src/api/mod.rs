//! HTTP API handlers for rollcall-mentor
//!
//! Every route answers a wrong method with 405 and a JSON body; unknown
//! paths get a JSON 404.

pub mod attendance;
pub mod health;
pub mod messaging;
pub mod roll_call;
pub mod sse;
pub mod students;

use crate::error::ApiError;
use crate::AppState;
use axum::routing::{get, post, put};
use axum::Router;

/// Routes for the whole service
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check).fallback(method_not_allowed))
        // Directory
        .route("/api/students", get(students::list_students).fallback(method_not_allowed))
        .route("/api/add-student", post(students::add_student).fallback(method_not_allowed))
        .route(
            "/api/update-student",
            put(students::update_student).fallback(method_not_allowed),
        )
        .route(
            "/api/students/:id/insights",
            get(students::student_insights).fallback(method_not_allowed),
        )
        .route(
            "/api/students/:id/attendance",
            get(students::student_attendance).fallback(method_not_allowed),
        )
        // Attendance persistence
        .route(
            "/api/attendance",
            post(attendance::record_attendance).fallback(method_not_allowed),
        )
        // Composer and Dispatcher
        .route("/api/compose", post(messaging::compose).fallback(method_not_allowed))
        .route("/api/send-sms", post(messaging::send_sms).fallback(method_not_allowed))
        .route(
            "/api/request-details",
            post(messaging::request_details).fallback(method_not_allowed),
        )
        // Roll-call workflow
        .route("/api/roll-call", get(roll_call::roll_call).fallback(method_not_allowed))
        .route("/api/roll-call/mark", post(roll_call::mark).fallback(method_not_allowed))
        .route(
            "/api/notifications",
            get(roll_call::notifications).fallback(method_not_allowed),
        )
        // SSE event stream
        .route("/events", get(sse::event_stream).fallback(method_not_allowed))
        .fallback(not_found)
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

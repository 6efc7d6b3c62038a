//! rollcall-mentor library interface
//!
//! Exposes the router and application state for the binary and for
//! integration tests.

pub mod api;
pub mod error;
pub mod services;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use rollcall_common::events::EventBus;
use rollcall_common::Clock;
use services::{GenerativeComposer, SmsDispatcher, TextGenerator};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use workflow::{AttendanceController, NotificationLog, SqliteRoster, StageStore};

/// External collaborators injected into the service
pub struct Collaborators {
    pub generator: Arc<dyn TextGenerator>,
    pub dispatcher: Arc<dyn SmsDispatcher>,
    pub clock: Arc<dyn Clock>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Roll-call statuses, stages and the sent-message log
    pub controller: Arc<AttendanceController>,
    pub composer: Arc<GenerativeComposer>,
    pub dispatcher: Arc<dyn SmsDispatcher>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        collaborators: Collaborators,
        stage_clear_after: Duration,
    ) -> Self {
        let Collaborators {
            generator,
            dispatcher,
            clock,
        } = collaborators;

        let composer = Arc::new(GenerativeComposer::new(generator, clock.clone()));
        let stages = Arc::new(StageStore::new(
            clock.clone(),
            stage_clear_after,
            event_bus.clone(),
        ));
        let log = Arc::new(NotificationLog::new(event_bus.clone()));

        let controller = Arc::new(AttendanceController::new(
            Arc::new(SqliteRoster::new(db.clone())),
            composer.clone(),
            dispatcher.clone(),
            stages,
            log,
            clock.clone(),
            event_bus.clone(),
        ));

        Self {
            db,
            event_bus,
            controller,
            composer,
            dispatcher,
            startup_time: clock.now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

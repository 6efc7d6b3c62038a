//! Attendance Workflow Controller
//!
//! `mark_attendance` runs in two phases:
//! 1. [`AttendanceController::apply`] (synchronous): no-op guard and the
//!    optimistic roll-call update. Never rolled back.
//! 2. [`AttendanceController::complete`] (async): persistence, then for
//!    absences the notification pipeline
//!    `ai-generation -> transmitting -> sent | error`.
//!
//! Persistence failures are logged and swallowed. Composition or dispatch
//! failures leave the student in `error` until the next absence. Nothing is
//! retried.

use crate::services::{MessageComposer, SmsDispatcher, StudentSnapshot};
use crate::workflow::{NotificationLog, StageStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_common::db;
use rollcall_common::events::{EventBus, RollcallEvent};
use rollcall_common::models::{
    AttendanceRecord, AttendanceStatus, Recipient, Student, TransmissionStage,
};
use rollcall_common::{Clock, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Directory and attendance persistence as seen by the workflow
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn find_student(&self, student_id: &str) -> Result<Option<Student>>;

    async fn record_attendance(
        &self,
        student_id: &str,
        status: AttendanceStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<AttendanceRecord>;
}

/// [`RosterStore`] over the SQLite directory
pub struct SqliteRoster {
    pool: SqlitePool,
}

impl SqliteRoster {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RosterStore for SqliteRoster {
    async fn find_student(&self, student_id: &str) -> Result<Option<Student>> {
        db::students::find_student(&self.pool, student_id).await
    }

    async fn record_attendance(
        &self,
        student_id: &str,
        status: AttendanceStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<AttendanceRecord> {
        db::attendance::record_attendance(&self.pool, student_id, status, timestamp).await
    }
}

/// How a mark ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Status already current; nothing happened
    Unchanged,
    /// Non-absent status applied
    Recorded { persisted: bool },
    /// Absence notified; both messages delivered
    Notified { delivered: usize },
    /// Absence workflow ended in `error`
    Failed { delivered: usize },
    /// Absence for a student the directory does not know
    StudentMissing,
}

/// Per-status counts for the roll-call header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RollCallSummary {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

pub struct AttendanceController {
    roster: Arc<dyn RosterStore>,
    composer: Arc<dyn MessageComposer>,
    dispatcher: Arc<dyn SmsDispatcher>,
    stages: Arc<StageStore>,
    log: Arc<NotificationLog>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    statuses: Mutex<HashMap<String, AttendanceStatus>>,
}

impl AttendanceController {
    pub fn new(
        roster: Arc<dyn RosterStore>,
        composer: Arc<dyn MessageComposer>,
        dispatcher: Arc<dyn SmsDispatcher>,
        stages: Arc<StageStore>,
        log: Arc<NotificationLog>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            roster,
            composer,
            dispatcher,
            stages,
            log,
            clock,
            event_bus,
            statuses: Mutex::new(HashMap::new()),
        }
    }

    pub fn stages(&self) -> &Arc<StageStore> {
        &self.stages
    }

    pub fn notification_log(&self) -> &Arc<NotificationLog> {
        &self.log
    }

    pub fn statuses(&self) -> HashMap<String, AttendanceStatus> {
        self.lock_statuses().clone()
    }

    pub fn summary(&self) -> RollCallSummary {
        let statuses = self.lock_statuses();
        let mut summary = RollCallSummary::default();
        for status in statuses.values() {
            match status {
                AttendanceStatus::Present => summary.present += 1,
                AttendanceStatus::Absent => summary.absent += 1,
                AttendanceStatus::Late => summary.late += 1,
            }
        }
        summary
    }

    /// Guard plus optimistic update; false when the status is already current
    pub fn apply(&self, student_id: &str, status: AttendanceStatus) -> bool {
        {
            let mut statuses = self.lock_statuses();
            if statuses.get(student_id) == Some(&status) {
                return false;
            }
            statuses.insert(student_id.to_string(), status);
        }

        self.event_bus.emit_lossy(RollcallEvent::AttendanceMarked {
            student_id: student_id.to_string(),
            status,
            timestamp: self.clock.now(),
        });
        true
    }

    /// Full mark, awaited to the end of the workflow
    pub async fn mark_attendance(&self, student_id: &str, status: AttendanceStatus) -> MarkOutcome {
        if !self.apply(student_id, status) {
            return MarkOutcome::Unchanged;
        }
        self.complete(student_id, status).await
    }

    /// Apply now, run the rest on its own task; `None` when unchanged
    pub fn begin(
        self: &Arc<Self>,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Option<JoinHandle<MarkOutcome>> {
        if !self.apply(student_id, status) {
            return None;
        }

        let controller = Arc::clone(self);
        let student_id = student_id.to_string();
        Some(tokio::spawn(async move {
            controller.complete(&student_id, status).await
        }))
    }

    /// Everything after the optimistic update
    pub async fn complete(&self, student_id: &str, status: AttendanceStatus) -> MarkOutcome {
        let persisted = match self
            .roster
            .record_attendance(student_id, status, self.clock.now())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(student_id = %student_id, status = %status, error = %e, "Failed to persist attendance");
                false
            }
        };

        if status != AttendanceStatus::Absent {
            return MarkOutcome::Recorded { persisted };
        }

        self.notify_absence(student_id).await
    }

    async fn notify_absence(&self, student_id: &str) -> MarkOutcome {
        let student = match self.roster.find_student(student_id).await {
            Ok(Some(student)) => student,
            Ok(None) => {
                warn!(student_id = %student_id, "Absent student not in directory, skipping notification");
                return MarkOutcome::StudentMissing;
            }
            Err(e) => {
                warn!(student_id = %student_id, error = %e, "Could not load absent student, skipping notification");
                return MarkOutcome::StudentMissing;
            }
        };

        self.stages.set(student_id, TransmissionStage::AiGeneration).await;

        let snapshot = StudentSnapshot::from(&student);
        let (parent_draft, student_draft) = tokio::join!(
            self.composer.absence_message(&snapshot, Recipient::Parent),
            self.composer.absence_message(&snapshot, Recipient::Student),
        );

        let drafts = match (parent_draft, student_draft) {
            (Ok(parent), Ok(own)) => [(Recipient::Parent, parent), (Recipient::Student, own)],
            (Err(e), _) | (_, Err(e)) => {
                warn!(student_id = %student_id, error = %e, "Absence message composition failed");
                self.stages.set(student_id, TransmissionStage::Error).await;
                return MarkOutcome::Failed { delivered: 0 };
            }
        };

        self.stages.set(student_id, TransmissionStage::Transmitting).await;

        let mut delivered = 0;
        for (recipient, message) in &drafts {
            let phone = recipient.phone_of(&student);
            match self.dispatcher.send(phone, message).await {
                Ok(()) => {
                    self.log
                        .record_sent(student_id, *recipient, phone, message, self.clock.now())
                        .await;
                    delivered += 1;
                }
                Err(e) => {
                    warn!(student_id = %student_id, recipient = %recipient, error = %e, "Absence SMS failed");
                }
            }
        }

        if delivered == drafts.len() {
            self.stages.mark_sent(student_id).await;
            info!(student_id = %student_id, roll_number = %student.roll_number, "Absence notifications delivered");
            MarkOutcome::Notified { delivered }
        } else {
            self.stages.set(student_id, TransmissionStage::Error).await;
            MarkOutcome::Failed { delivered }
        }
    }

    fn lock_statuses(&self) -> MutexGuard<'_, HashMap<String, AttendanceStatus>> {
        self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Attendance workflow tests
//!
//! Drive `AttendanceController` against an in-memory directory with fake
//! collaborators and a manual clock.

mod helpers;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helpers::{intake, pool_with_asha, FixedGenerator, RecordingDispatcher};
use rollcall_common::db;
use rollcall_common::events::{EventBus, RollcallEvent};
use rollcall_common::models::{
    AttendanceRecord, AttendanceStatus, Recipient, Student, TransmissionStage,
};
use rollcall_common::{Clock, ManualClock, Result as CommonResult};
use rollcall_mentor::services::{
    ComposeError, GenerativeComposer, MessageComposer, StudentSnapshot, TextGenerator,
};
use rollcall_mentor::workflow::{
    AttendanceController, MarkOutcome, NotificationLog, RosterStore, SqliteRoster, StageStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Barrier};

const CLEAR_AFTER: Duration = Duration::from_secs(3);

struct Harness {
    controller: Arc<AttendanceController>,
    clock: Arc<ManualClock>,
    events: broadcast::Receiver<RollcallEvent>,
}

fn harness(
    roster: Arc<dyn RosterStore>,
    composer: Arc<dyn MessageComposer>,
    dispatcher: Arc<RecordingDispatcher>,
) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let bus = EventBus::new(256);
    let events = bus.subscribe();

    let stages = Arc::new(StageStore::new(clock.clone(), CLEAR_AFTER, bus.clone()));
    let log = Arc::new(NotificationLog::new(bus.clone()));
    let controller = Arc::new(AttendanceController::new(
        roster,
        composer,
        dispatcher,
        stages,
        log,
        clock.clone(),
        bus,
    ));

    Harness {
        controller,
        clock,
        events,
    }
}

fn generative(generator: FixedGenerator, clock: Arc<ManualClock>) -> Arc<dyn MessageComposer> {
    let generator: Arc<dyn TextGenerator> = Arc::new(generator);
    Arc::new(GenerativeComposer::new(generator, clock))
}

/// Harness whose composer shares the harness clock
fn sqlite_harness(
    pool: &SqlitePool,
    generator: FixedGenerator,
    dispatcher: Arc<RecordingDispatcher>,
) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let bus = EventBus::new(256);
    let events = bus.subscribe();

    let stages = Arc::new(StageStore::new(clock.clone(), CLEAR_AFTER, bus.clone()));
    let log = Arc::new(NotificationLog::new(bus.clone()));
    let controller = Arc::new(AttendanceController::new(
        Arc::new(SqliteRoster::new(pool.clone())),
        generative(generator, clock.clone()),
        dispatcher,
        stages,
        log,
        clock.clone(),
        bus,
    ));

    Harness {
        controller,
        clock,
        events,
    }
}

/// Stage transitions seen for one student so far
fn stage_trail(
    events: &mut broadcast::Receiver<RollcallEvent>,
    student_id: &str,
) -> Vec<Option<TransmissionStage>> {
    let mut trail = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RollcallEvent::StageChanged {
            student_id: id,
            stage,
            ..
        } = event
        {
            if id == student_id {
                trail.push(stage);
            }
        }
    }
    trail
}

async fn wait_for_idle(controller: &AttendanceController, student_id: &str) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while controller.stages().get(student_id).await.is_some() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("sent stage should clear");
}

/// Composer that always fails
struct BrokenComposer;

#[async_trait]
impl MessageComposer for BrokenComposer {
    async fn absence_message(
        &self,
        _student: &StudentSnapshot,
        _recipient: Recipient,
    ) -> Result<String, ComposeError> {
        Err(ComposeError::Network("connection reset".to_string()))
    }
}

/// Composer that only answers once both drafts are in progress
struct PairedComposer {
    barrier: Barrier,
}

#[async_trait]
impl MessageComposer for PairedComposer {
    async fn absence_message(
        &self,
        student: &StudentSnapshot,
        _recipient: Recipient,
    ) -> Result<String, ComposeError> {
        self.barrier.wait().await;
        Ok(format!("{} ({}) was absent today.", student.name, student.roll_number))
    }
}

/// Roster whose writes always fail
struct ReadOnlyRoster {
    inner: SqliteRoster,
}

#[async_trait]
impl RosterStore for ReadOnlyRoster {
    async fn find_student(&self, student_id: &str) -> CommonResult<Option<Student>> {
        self.inner.find_student(student_id).await
    }

    async fn record_attendance(
        &self,
        _student_id: &str,
        _status: AttendanceStatus,
        _timestamp: DateTime<Utc>,
    ) -> CommonResult<AttendanceRecord> {
        Err(rollcall_common::Error::Internal("disk full".to_string()))
    }
}

#[tokio::test]
async fn test_asha_rao_absence_full_cycle() {
    let (pool, asha) = pool_with_asha().await;
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let mut h = sqlite_harness(
        &pool,
        FixedGenerator::replying("Asha Rao (24R01A0001) was absent today."),
        dispatcher.clone(),
    );
    let started = h.clock.now();

    let outcome = h
        .controller
        .mark_attendance(&asha.id, AttendanceStatus::Absent)
        .await;
    assert_eq!(outcome, MarkOutcome::Notified { delivered: 2 });

    // Parent first, then student
    let attempts = dispatcher.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].0, "9000000001");
    assert_eq!(attempts[1].0, "9000000002");

    let entries = h.controller.notification_log().entries().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].recipient, Recipient::Student);
    assert_eq!(entries[1].recipient, Recipient::Parent);
    assert_ne!(entries[0].id, entries[1].id);
    assert!(entries.iter().all(|e| e.timestamp >= started));
    assert!(entries.iter().all(|e| e.student_id == asha.id));

    assert_eq!(
        stage_trail(&mut h.events, &asha.id),
        vec![
            Some(TransmissionStage::AiGeneration),
            Some(TransmissionStage::Transmitting),
            Some(TransmissionStage::Sent),
        ]
    );

    h.clock.advance(Duration::from_millis(2999));
    tokio::task::yield_now().await;
    assert_eq!(
        h.controller.stages().get(&asha.id).await,
        Some(TransmissionStage::Sent)
    );

    h.clock.advance(Duration::from_millis(1));
    wait_for_idle(&h.controller, &asha.id).await;
    assert_eq!(stage_trail(&mut h.events, &asha.id), vec![None]);

    let records = db::attendance::list_for_student(&pool, &asha.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AttendanceStatus::Absent);
}

#[tokio::test]
async fn test_repeat_status_is_a_no_op() {
    let (pool, asha) = pool_with_asha().await;
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let mut h = sqlite_harness(&pool, FixedGenerator::replying("unused"), dispatcher.clone());

    let first = h
        .controller
        .mark_attendance(&asha.id, AttendanceStatus::Present)
        .await;
    assert_eq!(first, MarkOutcome::Recorded { persisted: true });

    let second = h
        .controller
        .mark_attendance(&asha.id, AttendanceStatus::Present)
        .await;
    assert_eq!(second, MarkOutcome::Unchanged);

    assert!(stage_trail(&mut h.events, &asha.id).is_empty());
    assert!(h.controller.notification_log().entries().await.is_empty());
    assert!(dispatcher.attempts().is_empty());

    let records = db::attendance::list_for_student(&pool, &asha.id).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_composer_failure_falls_back_to_templates() {
    let (pool, asha) = pool_with_asha().await;
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let h = sqlite_harness(&pool, FixedGenerator::failing(), dispatcher.clone());

    let outcome = h
        .controller
        .mark_attendance(&asha.id, AttendanceStatus::Absent)
        .await;
    assert_eq!(outcome, MarkOutcome::Notified { delivered: 2 });

    let attempts = dispatcher.attempts();
    assert_eq!(attempts.len(), 2);
    for (_, message) in &attempts {
        assert!(message.contains("Asha Rao"));
        assert!(message.contains("24R01A0001"));
    }
}

#[tokio::test]
async fn test_dispatch_failure_sets_error_and_keeps_one_entry() {
    let (pool, asha) = pool_with_asha().await;
    let dispatcher = Arc::new(RecordingDispatcher::failing_for(&["9000000001"]));
    let mut h = sqlite_harness(&pool, FixedGenerator::replying("absent"), dispatcher.clone());

    let outcome = h
        .controller
        .mark_attendance(&asha.id, AttendanceStatus::Absent)
        .await;
    assert_eq!(outcome, MarkOutcome::Failed { delivered: 1 });

    // Student send still attempted after the parent send failed
    assert_eq!(dispatcher.attempts().len(), 2);

    let entries = h.controller.notification_log().entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].recipient, Recipient::Student);

    assert_eq!(
        stage_trail(&mut h.events, &asha.id).last(),
        Some(&Some(TransmissionStage::Error))
    );

    // Error is never cleared by time
    h.clock.advance(Duration::from_secs(60));
    tokio::task::yield_now().await;
    assert_eq!(
        h.controller.stages().get(&asha.id).await,
        Some(TransmissionStage::Error)
    );
}

#[tokio::test]
async fn test_both_sends_failing_logs_nothing() {
    let (pool, asha) = pool_with_asha().await;
    let dispatcher = Arc::new(RecordingDispatcher::failing_for(&["9000000001", "9000000002"]));
    let h = sqlite_harness(&pool, FixedGenerator::replying("absent"), dispatcher);

    let outcome = h
        .controller
        .mark_attendance(&asha.id, AttendanceStatus::Absent)
        .await;
    assert_eq!(outcome, MarkOutcome::Failed { delivered: 0 });
    assert!(h.controller.notification_log().entries().await.is_empty());
}

#[tokio::test]
async fn test_composition_error_skips_dispatch() {
    let (pool, asha) = pool_with_asha().await;
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let mut h = harness(
        Arc::new(SqliteRoster::new(pool.clone())),
        Arc::new(BrokenComposer),
        dispatcher.clone(),
    );

    let outcome = h
        .controller
        .mark_attendance(&asha.id, AttendanceStatus::Absent)
        .await;
    assert_eq!(outcome, MarkOutcome::Failed { delivered: 0 });
    assert!(dispatcher.attempts().is_empty());
    assert_eq!(
        stage_trail(&mut h.events, &asha.id),
        vec![
            Some(TransmissionStage::AiGeneration),
            Some(TransmissionStage::Error),
        ]
    );
}

#[tokio::test]
async fn test_drafts_are_requested_concurrently() {
    let (pool, asha) = pool_with_asha().await;
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let h = harness(
        Arc::new(SqliteRoster::new(pool.clone())),
        Arc::new(PairedComposer {
            barrier: Barrier::new(2),
        }),
        dispatcher.clone(),
    );

    // Sequential drafting would leave the first request waiting forever
    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        h.controller
            .mark_attendance(&asha.id, AttendanceStatus::Absent),
    )
    .await
    .expect("parent and student drafts should overlap");
    assert_eq!(outcome, MarkOutcome::Notified { delivered: 2 });

    let attempts = dispatcher.attempts();
    assert_eq!(attempts.len(), 2);
    for (_, message) in attempts {
        assert_eq!(message, "Asha Rao (24R01A0001) was absent today.");
    }
}

#[tokio::test]
async fn test_persistence_failure_does_not_stop_notification() {
    let (pool, asha) = pool_with_asha().await;
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let roster = Arc::new(ReadOnlyRoster {
        inner: SqliteRoster::new(pool.clone()),
    });
    let clock = Arc::new(ManualClock::starting_now());
    let h = harness(
        roster,
        generative(FixedGenerator::replying("absent"), clock),
        dispatcher,
    );

    let outcome = h
        .controller
        .mark_attendance(&asha.id, AttendanceStatus::Absent)
        .await;
    assert_eq!(outcome, MarkOutcome::Notified { delivered: 2 });

    // Optimistic status kept even though nothing was stored
    assert_eq!(
        h.controller.statuses().get(&asha.id),
        Some(&AttendanceStatus::Absent)
    );
    let records = db::attendance::list_for_student(&pool, &asha.id).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_unknown_student_ends_without_stage() {
    let (pool, _) = pool_with_asha().await;
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let mut h = sqlite_harness(&pool, FixedGenerator::replying("absent"), dispatcher.clone());

    let outcome = h
        .controller
        .mark_attendance("ghost", AttendanceStatus::Absent)
        .await;
    assert_eq!(outcome, MarkOutcome::StudentMissing);
    assert!(stage_trail(&mut h.events, "ghost").is_empty());
    assert!(h.controller.stages().get("ghost").await.is_none());
    assert!(dispatcher.attempts().is_empty());
}

#[tokio::test]
async fn test_concurrent_absences_do_not_mix() {
    let (pool, asha) = pool_with_asha().await;
    let ravi = db::students::create_student(
        &pool,
        &intake("Ravi Kumar", "24R01A0002", "9000000011", "9000000012"),
    )
    .await
    .unwrap();

    let dispatcher = Arc::new(RecordingDispatcher::new());
    let h = sqlite_harness(&pool, FixedGenerator::failing(), dispatcher);

    let asha_task = h.controller.begin(&asha.id, AttendanceStatus::Absent).unwrap();
    let ravi_task = h.controller.begin(&ravi.id, AttendanceStatus::Absent).unwrap();
    let (asha_outcome, ravi_outcome) = tokio::join!(asha_task, ravi_task);
    assert_eq!(asha_outcome.unwrap(), MarkOutcome::Notified { delivered: 2 });
    assert_eq!(ravi_outcome.unwrap(), MarkOutcome::Notified { delivered: 2 });

    let log = h.controller.notification_log();
    for (student, phones) in [
        (&asha, ["9000000001", "9000000002"]),
        (&ravi, ["9000000011", "9000000012"]),
    ] {
        let entries = log.entries_for(&student.id).await;
        assert_eq!(entries.len(), 2);
        for entry in entries {
            assert!(phones.contains(&entry.phone.as_str()));
            assert!(entry.message.contains(&student.name));
            assert!(entry.message.contains(&student.roll_number));
        }
    }

    let stages = h.controller.stages().snapshot().await;
    assert_eq!(stages.get(&asha.id), Some(&TransmissionStage::Sent));
    assert_eq!(stages.get(&ravi.id), Some(&TransmissionStage::Sent));

    h.clock.advance(CLEAR_AFTER);
    wait_for_idle(&h.controller, &asha.id).await;
    wait_for_idle(&h.controller, &ravi.id).await;

    let summary = h.controller.summary();
    assert_eq!(summary.absent, 2);
    assert_eq!(summary.present, 0);
}

#[tokio::test]
async fn test_remark_after_error_starts_fresh_workflow() {
    let (pool, asha) = pool_with_asha().await;
    let dispatcher = Arc::new(RecordingDispatcher::failing_for(&["9000000002"]));
    let h = sqlite_harness(&pool, FixedGenerator::replying("absent"), dispatcher);

    // First cycle: student send fails
    assert_eq!(
        h.controller
            .mark_attendance(&asha.id, AttendanceStatus::Absent)
            .await,
        MarkOutcome::Failed { delivered: 1 }
    );

    // Present then absent again starts a fresh workflow
    h.controller
        .mark_attendance(&asha.id, AttendanceStatus::Present)
        .await;
    assert_eq!(
        h.controller.stages().get(&asha.id).await,
        Some(TransmissionStage::Error)
    );
    h.controller
        .mark_attendance(&asha.id, AttendanceStatus::Absent)
        .await;

    assert_eq!(h.controller.notification_log().entries().await.len(), 2);
    let records = db::attendance::list_for_student(&pool, &asha.id).await.unwrap();
    assert_eq!(records.len(), 3);
}

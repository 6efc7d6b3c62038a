//! Event types and broadcast bus
//!
//! The workflow emits events as it runs; the SSE endpoint forwards them to
//! dashboards. Emitting never blocks and never fails the workflow.

use crate::models::{AttendanceStatus, NotificationLogEntry, TransmissionStage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Roll-call event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RollcallEvent {
    /// Roll-call status applied to a student (optimistic, before persistence)
    AttendanceMarked {
        student_id: String,
        status: AttendanceStatus,
        timestamp: DateTime<Utc>,
    },

    /// Transmission stage changed; `None` means the entry was cleared (idle)
    StageChanged {
        student_id: String,
        stage: Option<TransmissionStage>,
        timestamp: DateTime<Utc>,
    },

    /// An SMS was delivered and logged (drives the toast)
    NotificationSent { entry: NotificationLogEntry },
}

impl RollcallEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RollcallEvent::AttendanceMarked { .. } => "AttendanceMarked",
            RollcallEvent::StageChanged { .. } => "StageChanged",
            RollcallEvent::NotificationSent { .. } => "NotificationSent",
        }
    }
}

/// Broadcast channel shared by the workflow and SSE subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RollcallEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus; slow subscribers lose the oldest events
    /// once `capacity` is exceeded
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RollcallEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RollcallEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

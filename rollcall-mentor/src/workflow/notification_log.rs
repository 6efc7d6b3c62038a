//! In-memory log of delivered SMS, newest first
//!
//! Lives for the process lifetime; nothing is evicted.

use chrono::{DateTime, Utc};
use rollcall_common::events::{EventBus, RollcallEvent};
use rollcall_common::models::{DeliveryStatus, NotificationLogEntry, Recipient};
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct NotificationLog {
    entries: RwLock<Vec<NotificationLogEntry>>,
    event_bus: EventBus,
}

impl NotificationLog {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            event_bus,
        }
    }

    /// Record one delivered message and broadcast it as a toast
    pub async fn record_sent(
        &self,
        student_id: &str,
        recipient: Recipient,
        phone: &str,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> NotificationLogEntry {
        let entry = NotificationLogEntry {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            recipient,
            phone: phone.to_string(),
            message: message.to_string(),
            timestamp,
            status: DeliveryStatus::Sent,
        };

        self.entries.write().await.insert(0, entry.clone());
        self.event_bus.emit_lossy(RollcallEvent::NotificationSent {
            entry: entry.clone(),
        });

        entry
    }

    pub async fn entries(&self) -> Vec<NotificationLogEntry> {
        self.entries.read().await.clone()
    }

    pub async fn entries_for(&self, student_id: &str) -> Vec<NotificationLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect()
    }
}

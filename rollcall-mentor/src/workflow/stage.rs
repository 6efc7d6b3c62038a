//! Per-student transmission stage store
//!
//! Idle is the absence of an entry. Every write gets a new generation number
//! so a delayed clear only removes the `sent` entry it was scheduled for; a
//! newer workflow for the same student is left alone.

use rollcall_common::events::{EventBus, RollcallEvent};
use rollcall_common::models::TransmissionStage;
use rollcall_common::Clock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct StageEntry {
    stage: TransmissionStage,
    generation: u64,
}

/// Keyed store of [`TransmissionStage`] with delayed clearing of `sent`
pub struct StageStore {
    entries: RwLock<HashMap<String, StageEntry>>,
    next_generation: AtomicU64,
    clock: Arc<dyn Clock>,
    clear_after: Duration,
    event_bus: EventBus,
}

impl StageStore {
    pub fn new(clock: Arc<dyn Clock>, clear_after: Duration, event_bus: EventBus) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            clock,
            clear_after,
            event_bus,
        }
    }

    /// Set the stage for a student, returning the entry's generation
    pub async fn set(&self, student_id: &str, stage: TransmissionStage) -> u64 {
        let mut entries = self.entries.write().await;
        // Taken under the write lock so generations follow write order
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        entries.insert(student_id.to_string(), StageEntry { stage, generation });
        self.announce(student_id, Some(stage));
        debug!(student_id = %student_id, stage = stage.label(), "Stage set");
        generation
    }

    pub async fn get(&self, student_id: &str) -> Option<TransmissionStage> {
        self.entries.read().await.get(student_id).map(|e| e.stage)
    }

    /// All non-idle students
    pub async fn snapshot(&self) -> HashMap<String, TransmissionStage> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(id, entry)| (id.clone(), entry.stage))
            .collect()
    }

    /// Set `sent` and schedule the return to idle
    pub async fn mark_sent(self: &Arc<Self>, student_id: &str) {
        let generation = self.set(student_id, TransmissionStage::Sent).await;
        let deadline = self.clock.deadline_after(self.clear_after);

        let store = Arc::clone(self);
        let student_id = student_id.to_string();
        tokio::spawn(async move {
            store.clock.sleep_until(deadline).await;
            store.clear_generation(&student_id, generation).await;
        });
    }

    async fn clear_generation(&self, student_id: &str, generation: u64) {
        let mut entries = self.entries.write().await;
        match entries.get(student_id) {
            Some(entry) if entry.generation == generation => {
                entries.remove(student_id);
                self.announce(student_id, None);
                debug!(student_id = %student_id, "Sent stage cleared");
            }
            _ => debug!(student_id = %student_id, "Stage moved on, skipping clear"),
        }
    }

    fn announce(&self, student_id: &str, stage: Option<TransmissionStage>) {
        self.event_bus.emit_lossy(RollcallEvent::StageChanged {
            student_id: student_id.to_string(),
            stage,
            timestamp: self.clock.now(),
        });
    }
}

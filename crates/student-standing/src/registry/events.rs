use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::domain::StudentRecord;

/// Immutable fact describing one mutation. Payloads carry the affected
/// record(s) so subscribers never need a follow-up read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChangeEvent {
    RecordCreated { record: StudentRecord },
    RecordUpdated { record: StudentRecord },
    RecordDeleted { student_number: String },
    BatchImported { records: Vec<StudentRecord> },
}

impl ChangeEvent {
    pub const fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::RecordCreated { .. } => "record-created",
            ChangeEvent::RecordUpdated { .. } => "record-updated",
            ChangeEvent::RecordDeleted { .. } => "record-deleted",
            ChangeEvent::BatchImported { .. } => "batch-imported",
        }
    }

    pub const KINDS: [&'static str; 4] = [
        "record-created",
        "record-updated",
        "record-deleted",
        "batch-imported",
    ];
}

/// Explicitly constructed publish/subscribe fan-out over a broadcast
/// channel. Delivery is best-effort and at-most-once: a disconnected
/// subscriber misses the event and relies on its next full refresh.
#[derive(Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Non-blocking fan-out; the mutation's response never waits on
    /// subscriber delivery.
    pub fn publish(&self, event: ChangeEvent) {
        let delivered = self.sender.send(event.clone()).unwrap_or(0);
        tracing::debug!(kind = event.kind(), subscribers = delivered, "change event published");
    }

    /// Receiver lifetime is the subscriber's connection lifetime; dropping
    /// it unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

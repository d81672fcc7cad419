use biblioscope_core::ItemId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::rows::RowStatus;

/// Row state handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSnapshot {
    pub id: ItemId,
    pub status: RowStatus,
    pub message: String,
}

/// One queue notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RowEvent {
    Added(RowSnapshot),
    Updated(RowSnapshot),
    Deleted(RowSnapshot),
    Empty,
    NonEmpty,
}

impl RowEvent {
    pub fn dispatch(&self, observer: &dyn RecognitionObserver) {
        match self {
            Self::Added(row) => observer.on_row_added(row),
            Self::Updated(row) => observer.on_row_updated(row),
            Self::Deleted(row) => observer.on_row_deleted(row),
            Self::Empty => observer.on_empty(),
            Self::NonEmpty => observer.on_non_empty(),
        }
    }
}

/// Receives queue notifications. Called synchronously from the thread that
/// changed the queue, after its lock is released, in the order the changes
/// were made. Implementations must return quickly and must not call back
/// into the `Recognizer`.
pub trait RecognitionObserver: Send + Sync {
    fn on_row_added(&self, _row: &RowSnapshot) {}
    fn on_row_updated(&self, _row: &RowSnapshot) {}
    fn on_row_deleted(&self, _row: &RowSnapshot) {}
    fn on_empty(&self) {}
    fn on_non_empty(&self) {}
}

/// Forwards every notification into an unbounded channel.
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<RowEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, event: RowEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.sender.send(event);
    }
}

impl RecognitionObserver for ChannelObserver {
    fn on_row_added(&self, row: &RowSnapshot) {
        self.forward(RowEvent::Added(row.clone()));
    }

    fn on_row_updated(&self, row: &RowSnapshot) {
        self.forward(RowEvent::Updated(row.clone()));
    }

    fn on_row_deleted(&self, row: &RowSnapshot) {
        self.forward(RowEvent::Deleted(row.clone()));
    }

    fn on_empty(&self) {
        self.forward(RowEvent::Empty);
    }

    fn on_non_empty(&self) {
        self.forward(RowEvent::NonEmpty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(status: RowStatus) -> RowSnapshot {
        RowSnapshot {
            id: ItemId(7),
            status,
            message: "processing".into(),
        }
    }

    #[test]
    fn channel_observer_forwards_in_order() {
        let (observer, mut rx) = ChannelObserver::new();
        let events = vec![
            RowEvent::Added(snapshot(RowStatus::Queued)),
            RowEvent::NonEmpty,
            RowEvent::Updated(snapshot(RowStatus::Processing)),
            RowEvent::Deleted(snapshot(RowStatus::Failed)),
            RowEvent::Empty,
        ];
        for event in &events {
            event.dispatch(&observer);
        }

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received, events);
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_empty();
    }

    #[test]
    fn events_serialize_with_tag() {
        let value = serde_json::to_value(RowEvent::Updated(snapshot(RowStatus::Processing))).unwrap();
        assert_eq!(
            value,
            json!({"event": "updated", "id": 7, "status": "processing", "message": "processing"})
        );
        assert_eq!(serde_json::to_value(RowEvent::NonEmpty).unwrap(), json!({"event": "non_empty"}));
    }
}

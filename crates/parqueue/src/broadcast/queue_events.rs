//! Queue event broadcaster for real-time progress display.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::queue::{ItemId, WorkItemSnapshot};

/// A change to the queue or the history view.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueueEvent {
    ItemsAdded {
        items: Vec<WorkItemSnapshot>,
    },
    #[serde(rename_all = "camelCase")]
    ItemStarted {
        id: ItemId,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    ItemProgress {
        id: ItemId,
        progress_percent: f64,
        elapsed_seconds: Option<f64>,
        remaining_seconds: Option<f64>,
    },
    ItemCompleted {
        item: WorkItemSnapshot,
    },
    ItemFailed {
        item: WorkItemSnapshot,
    },
    ItemsRemoved {
        ids: Vec<ItemId>,
    },
    HistoryUpdated {
        entries: usize,
    },
    /// Nothing is pending and no conversion is in flight.
    Drained,
}

/// Broadcasts queue events to subscribers.
#[derive(Clone)]
pub struct QueueEventBroadcaster {
    sender: Arc<broadcast::Sender<QueueEvent>>,
}

impl QueueEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: QueueEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for QueueEventBroadcaster {
    fn default() -> Self {
        Self::new(1024)
    }
}

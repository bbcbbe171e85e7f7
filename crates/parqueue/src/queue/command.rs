use serde::Serialize;
use tokio::sync::oneshot;

use crate::client::HistoryEntry;
use crate::error::QueueError;
use crate::queue::item::{ItemId, SourceHandle, WorkItemSnapshot, WorkStatus};

#[derive(Debug)]
pub enum QueueCommand {
    Enqueue {
        sources: Vec<SourceHandle>,
        reply: oneshot::Sender<Vec<ItemId>>,
    },
    Remove {
        id: ItemId,
        reply: oneshot::Sender<Result<bool, QueueError>>,
    },
    ClearCompleted {
        reply: oneshot::Sender<Vec<ItemId>>,
    },
    Snapshot {
        reply: oneshot::Sender<QueueSnapshot>,
    },
    RefreshHistory,
    DeleteHistory {
        id: String,
    },
    Shutdown,
}

/// Point-in-time copy of the queue and the cached history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub items: Vec<WorkItemSnapshot>,
    pub history: Vec<HistoryEntry>,
}

impl QueueSnapshot {
    pub fn count(&self, status: WorkStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }

    /// True when nothing is pending or converting.
    pub fn is_idle(&self) -> bool {
        self.items.iter().all(|item| item.status.is_terminal())
    }

    pub fn item(&self, id: ItemId) -> Option<&WorkItemSnapshot> {
        self.items.iter().find(|item| item.id == id)
    }
}

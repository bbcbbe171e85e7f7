//! Read-only cache of the service's conversion history.

use crate::client::HistoryEntry;

/// Cached history plus a refresh generation counter.
///
/// Refreshes run concurrently with the queue, so a slow response may arrive
/// after a newer one. Only results newer than the last applied refresh are kept.
#[derive(Debug, Default)]
pub struct HistoryView {
    entries: Vec<HistoryEntry>,
    requested: u64,
    applied: u64,
}

impl HistoryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a generation number for a refresh about to be issued.
    pub fn begin_refresh(&mut self) -> u64 {
        self.requested += 1;
        self.requested
    }

    /// Replaces the cache wholesale. Returns false if the result is stale.
    pub fn apply(&mut self, generation: u64, entries: Vec<HistoryEntry>) -> bool {
        if generation <= self.applied {
            return false;
        }
        self.applied = generation;
        self.entries = entries;
        true
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn find(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }
}

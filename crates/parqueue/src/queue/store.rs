//! Ordered list of work items; the only place queue state is mutated.
//!
//! Every status change goes through [`QueueStore::patch`], which rejects
//! transitions outside `pending -> converting -> {done, error}` and refuses to
//! start a second conversion while one is active.

use std::time::Duration;

use crate::client::ConversionResult;
use crate::error::QueueError;
use crate::queue::item::{ItemId, ItemPatch, SourceHandle, WorkItem, WorkItemSnapshot, WorkStatus};
use crate::queue::progress::{Estimate, REQUEST_SENT_PERCENT};

/// Message recorded when a failure carries no detail of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "Conversion failed";

/// An item that has just been moved to `converting`.
#[derive(Debug, Clone)]
pub struct Claim {
    pub id: ItemId,
    pub source: SourceHandle,
}

#[derive(Debug, Default)]
pub struct QueueStore {
    items: Vec<WorkItem>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one pending item per source, in the given order.
    pub fn enqueue<I>(&mut self, sources: I) -> Vec<ItemId>
    where
        I: IntoIterator<Item = SourceHandle>,
    {
        sources
            .into_iter()
            .map(|source| {
                let item = WorkItem::new(source);
                let id = item.id;
                self.items.push(item);
                id
            })
            .collect()
    }

    /// Applies a partial update to the item with `id`.
    ///
    /// Returns `Ok(false)` when no such item exists (it was already removed).
    pub fn patch(&mut self, id: ItemId, patch: ItemPatch) -> Result<bool, QueueError> {
        let active = self.converting().map(|item| item.id);
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return Ok(false);
        };

        let current = self.items[index].status;
        let next = patch.status.unwrap_or(current);

        if next != current {
            if !current.can_transition_to(next) {
                return Err(QueueError::InvalidTransition {
                    id,
                    from: current,
                    to: next,
                });
            }
            if next == WorkStatus::Converting {
                if let Some(active) = active {
                    return Err(QueueError::AlreadyConverting {
                        requested: id,
                        active,
                    });
                }
            }
        } else if current.is_terminal() && !patch.is_empty() {
            return Err(QueueError::InvalidPatch {
                id,
                reason: "item has already finished",
            });
        }

        if (patch.download_ref.is_some() || patch.converted_size.is_some())
            && next != WorkStatus::Done
        {
            return Err(QueueError::InvalidPatch {
                id,
                reason: "download locator and converted size are only set on done",
            });
        }
        if patch.error_message.is_some() && next != WorkStatus::Error {
            return Err(QueueError::InvalidPatch {
                id,
                reason: "error message is only set on error",
            });
        }
        if patch.remaining_seconds.is_some() && next == WorkStatus::Pending {
            return Err(QueueError::InvalidPatch {
                id,
                reason: "pending items have no remaining estimate",
            });
        }
        if patch.progress_percent.is_some_and(|p| !p.is_finite()) {
            return Err(QueueError::InvalidPatch {
                id,
                reason: "progress must be a finite number",
            });
        }

        let item = &mut self.items[index];
        item.status = next;

        if let Some(percent) = patch.progress_percent {
            let percent = percent.clamp(0.0, 100.0);
            item.progress_percent = if current == WorkStatus::Converting {
                item.progress_percent.max(percent)
            } else {
                percent
            };
        }
        if let Some(elapsed) = patch.elapsed_seconds {
            item.elapsed_seconds = Some(elapsed.max(0.0));
        }
        if let Some(remaining) = patch.remaining_seconds {
            item.remaining_seconds = Some(remaining.max(0.0));
        }
        if patch.download_ref.is_some() {
            item.download_ref = patch.download_ref;
        }
        if patch.converted_size.is_some() {
            item.converted_size = patch.converted_size;
        }
        if patch.error_message.is_some() {
            item.error_message = patch.error_message;
        }

        match next {
            WorkStatus::Done => {
                item.progress_percent = 100.0;
                item.remaining_seconds = Some(0.0);
            }
            WorkStatus::Error => {
                item.progress_percent = 0.0;
                item.remaining_seconds = None;
                if item.error_message.as_deref().map_or(true, |m| m.trim().is_empty()) {
                    item.error_message = Some(GENERIC_FAILURE_MESSAGE.to_string());
                }
            }
            WorkStatus::Pending | WorkStatus::Converting => {}
        }

        Ok(true)
    }

    /// Moves the first pending item to `converting`, unless a conversion is
    /// already active or nothing is pending.
    pub fn claim_next(&mut self) -> Option<Claim> {
        if self.converting().is_some() {
            return None;
        }

        let item = self
            .items
            .iter_mut()
            .find(|item| item.status == WorkStatus::Pending)?;
        let claim = Claim {
            id: item.id,
            source: item.source.take_payload(),
        };

        let started = ItemPatch::default()
            .status(WorkStatus::Converting)
            .progress(REQUEST_SENT_PERCENT)
            .elapsed(0.0);
        match self.patch(claim.id, started) {
            Ok(true) => Some(claim),
            _ => None,
        }
    }

    /// Writes an estimator tick. Ignored unless the item is still converting.
    pub fn record_progress(&mut self, id: ItemId, estimate: &Estimate) -> bool {
        if self.get(id).map(|item| item.status) != Some(WorkStatus::Converting) {
            return false;
        }

        let tick = ItemPatch::default()
            .progress(estimate.percent)
            .elapsed(estimate.elapsed_seconds)
            .remaining(estimate.remaining_seconds);
        matches!(self.patch(id, tick), Ok(true))
    }

    pub fn complete(
        &mut self,
        id: ItemId,
        result: &ConversionResult,
        elapsed: Duration,
    ) -> Result<bool, QueueError> {
        self.patch(
            id,
            ItemPatch::default()
                .status(WorkStatus::Done)
                .elapsed(elapsed.as_secs_f64())
                .download_ref(result.download_url.clone())
                .converted_size(result.converted_size),
        )
    }

    pub fn fail(&mut self, id: ItemId, message: &str) -> Result<bool, QueueError> {
        let message = if message.trim().is_empty() {
            GENERIC_FAILURE_MESSAGE
        } else {
            message
        };
        self.patch(
            id,
            ItemPatch::default()
                .status(WorkStatus::Error)
                .error_message(message),
        )
    }

    /// Removes every `done` and `error` item, keeping the order of the rest.
    pub fn remove_terminal(&mut self) -> Vec<ItemId> {
        let mut removed = Vec::new();
        self.items.retain(|item| {
            if item.status.is_terminal() {
                removed.push(item.id);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Removes a single pending or finished item. A converting item cannot be removed.
    pub fn remove(&mut self, id: ItemId) -> Result<bool, QueueError> {
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return Ok(false);
        };
        if self.items[index].status == WorkStatus::Converting {
            return Err(QueueError::ItemConverting(id));
        }
        self.items.remove(index);
        Ok(true)
    }

    pub fn converting(&self) -> Option<&WorkItem> {
        self.items
            .iter()
            .find(|item| item.status == WorkStatus::Converting)
    }

    pub fn has_pending(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.status == WorkStatus::Pending)
    }

    pub fn get(&self, id: ItemId) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> Vec<WorkItemSnapshot> {
        self.items.iter().map(WorkItem::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, size: usize) -> SourceHandle {
        SourceHandle::from_bytes(name, vec![0u8; size])
    }

    fn result(locator: &str, size: u64) -> ConversionResult {
        ConversionResult {
            download_url: locator.to_string(),
            converted_size: size,
            id: None,
            converted_name: None,
        }
    }

    fn statuses(store: &QueueStore) -> Vec<WorkStatus> {
        store.items().iter().map(|item| item.status()).collect()
    }

    #[test]
    fn test_enqueue_appends_pending_items_in_order() {
        let mut store = QueueStore::new();
        let first = store.enqueue([source("a.xlsx", 1), source("b.xlsx", 2)]);
        let second = store.enqueue([source("c.xls", 3)]);

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        let names: Vec<&str> = store.items().iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["a.xlsx", "b.xlsx", "c.xls"]);
        assert!(store.items().iter().all(|i| i.status() == WorkStatus::Pending
            && i.progress_percent() == 0.0
            && i.remaining_seconds().is_none()));
    }

    #[test]
    fn test_enqueue_nothing_is_noop() {
        let mut store = QueueStore::new();
        let ids = store.enqueue(Vec::new());
        assert!(ids.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_patch_missing_item_is_noop() {
        let mut store = QueueStore::new();
        let id = store.enqueue([source("a.xlsx", 1)])[0];
        store.remove(id).unwrap();

        let patched = store
            .patch(id, ItemPatch::default().status(WorkStatus::Converting))
            .unwrap();
        assert!(!patched);
    }

    #[test]
    fn test_claim_next_is_fifo_and_single_flight() {
        let mut store = QueueStore::new();
        let ids = store.enqueue([source("a.xlsx", 1), source("b.xlsx", 1)]);

        let claim = store.claim_next().unwrap();
        assert_eq!(claim.id, ids[0]);
        assert_eq!(store.get(ids[0]).unwrap().progress_percent(), REQUEST_SENT_PERCENT);
        assert!(store.claim_next().is_none());

        store.complete(ids[0], &result("/download/a", 5), Duration::from_secs(1)).unwrap();
        assert_eq!(store.claim_next().unwrap().id, ids[1]);
    }

    #[tokio::test]
    async fn test_claim_moves_payload_out_of_item() {
        let mut store = QueueStore::new();
        let id = store.enqueue([SourceHandle::from_bytes("a.xlsx", vec![9u8; 128])])[0];

        let claim = store.claim_next().unwrap();
        let item = store.get(id).unwrap();
        assert_eq!(item.declared_size(), 128);
        assert_eq!(item.snapshot().declared_size, 128);
        assert!(item.source().clone().into_bytes().await.unwrap().is_empty());
        assert_eq!(claim.source.into_bytes().await.unwrap(), vec![9u8; 128]);
    }

    #[test]
    fn test_second_converting_item_rejected() {
        let mut store = QueueStore::new();
        let ids = store.enqueue([source("a.xlsx", 1), source("b.xlsx", 1)]);
        store.claim_next().unwrap();

        let err = store
            .patch(ids[1], ItemPatch::default().status(WorkStatus::Converting))
            .unwrap_err();
        assert_eq!(
            err,
            QueueError::AlreadyConverting {
                requested: ids[1],
                active: ids[0],
            }
        );
        assert_eq!(store.get(ids[1]).unwrap().status(), WorkStatus::Pending);
    }

    #[test]
    fn test_terminal_states_do_not_revert() {
        let mut store = QueueStore::new();
        let id = store.enqueue([source("a.xlsx", 1)])[0];
        store.claim_next().unwrap();
        store.fail(id, "boom").unwrap();

        for status in [WorkStatus::Pending, WorkStatus::Converting, WorkStatus::Done] {
            let err = store
                .patch(id, ItemPatch::default().status(status))
                .unwrap_err();
            assert!(matches!(err, QueueError::InvalidTransition { .. }));
        }
        assert!(store
            .patch(id, ItemPatch::default().progress(50.0))
            .is_err());
        assert_eq!(store.get(id).unwrap().status(), WorkStatus::Error);
    }

    #[test]
    fn test_pending_cannot_jump_to_done() {
        let mut store = QueueStore::new();
        let id = store.enqueue([source("a.xlsx", 1)])[0];
        let err = store
            .patch(id, ItemPatch::default().status(WorkStatus::Done))
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition { .. }));
    }

    #[test]
    fn test_completion_fields_only_on_done() {
        let mut store = QueueStore::new();
        let id = store.enqueue([source("a.xlsx", 1)])[0];
        store.claim_next().unwrap();

        let err = store
            .patch(id, ItemPatch::default().download_ref("/download/a"))
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidPatch { .. }));
        let err = store
            .patch(id, ItemPatch::default().error_message("nope"))
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidPatch { .. }));
    }

    #[test]
    fn test_progress_is_clamped_and_non_decreasing() {
        let mut store = QueueStore::new();
        let id = store.enqueue([source("a.xlsx", 1)])[0];
        store.claim_next().unwrap();

        store.patch(id, ItemPatch::default().progress(40.0)).unwrap();
        store.patch(id, ItemPatch::default().progress(25.0)).unwrap();
        assert_eq!(store.get(id).unwrap().progress_percent(), 40.0);

        store.patch(id, ItemPatch::default().progress(250.0)).unwrap();
        assert_eq!(store.get(id).unwrap().progress_percent(), 100.0);
    }

    #[test]
    fn test_record_progress_only_while_converting() {
        let mut store = QueueStore::new();
        let id = store.enqueue([source("a.xlsx", 1)])[0];
        let tick = Estimate {
            percent: 55.0,
            elapsed_seconds: 2.0,
            remaining_seconds: 3.0,
        };

        assert!(!store.record_progress(id, &tick));
        assert_eq!(store.get(id).unwrap().progress_percent(), 0.0);

        store.claim_next().unwrap();
        assert!(store.record_progress(id, &tick));
        assert_eq!(store.get(id).unwrap().remaining_seconds(), Some(3.0));

        store.complete(id, &result("/d", 1), Duration::from_secs(2)).unwrap();
        assert!(!store.record_progress(id, &tick));
        assert_eq!(store.get(id).unwrap().progress_percent(), 100.0);
    }

    #[test]
    fn test_complete_sets_final_values() {
        let mut store = QueueStore::new();
        let id = store.enqueue([source("a.xlsx", 1)])[0];
        store.claim_next().unwrap();
        store.record_progress(
            id,
            &Estimate {
                percent: 90.0,
                elapsed_seconds: 30.0,
                remaining_seconds: 0.0,
            },
        );

        store
            .complete(id, &result("/download/a", 777), Duration::from_secs(4))
            .unwrap();
        let item = store.get(id).unwrap();
        assert_eq!(item.status(), WorkStatus::Done);
        assert_eq!(item.progress_percent(), 100.0);
        assert_eq!(item.remaining_seconds(), Some(0.0));
        assert_eq!(item.elapsed_seconds(), Some(4.0));
        assert_eq!(item.download_ref(), Some("/download/a"));
        assert_eq!(item.converted_size(), Some(777));
        assert!(item.error_message().is_none());
    }

    #[test]
    fn test_fail_resets_progress_and_keeps_message() {
        let mut store = QueueStore::new();
        let ids = store.enqueue([source("a.xlsx", 1), source("b.xlsx", 1)]);
        store.claim_next().unwrap();
        store.patch(ids[0], ItemPatch::default().progress(60.0)).unwrap();

        store.fail(ids[0], "unsupported format").unwrap();
        let item = store.get(ids[0]).unwrap();
        assert_eq!(item.status(), WorkStatus::Error);
        assert_eq!(item.progress_percent(), 0.0);
        assert_eq!(item.error_message(), Some("unsupported format"));
        assert_eq!(store.get(ids[1]).unwrap().status(), WorkStatus::Pending);
    }

    #[test]
    fn test_fail_with_empty_message_uses_fallback() {
        let mut store = QueueStore::new();
        let id = store.enqueue([source("a.xlsx", 1)])[0];
        store.claim_next().unwrap();
        store.fail(id, "  ").unwrap();
        assert_eq!(
            store.get(id).unwrap().error_message(),
            Some(GENERIC_FAILURE_MESSAGE)
        );
    }

    #[test]
    fn test_remove_terminal_keeps_active_items_in_order() {
        let mut store = QueueStore::new();
        let ids = store.enqueue([
            source("a.xlsx", 1),
            source("b.xlsx", 1),
            source("c.xlsx", 1),
            source("d.xlsx", 1),
        ]);
        store.claim_next().unwrap();
        store.complete(ids[0], &result("/a", 1), Duration::from_secs(1)).unwrap();
        store.claim_next().unwrap();
        store.fail(ids[1], "bad").unwrap();
        store.claim_next().unwrap();

        let removed = store.remove_terminal();
        assert_eq!(removed, vec![ids[0], ids[1]]);
        assert_eq!(statuses(&store), vec![WorkStatus::Converting, WorkStatus::Pending]);
        let remaining: Vec<ItemId> = store.items().iter().map(|i| i.id()).collect();
        assert_eq!(remaining, vec![ids[2], ids[3]]);
    }

    #[test]
    fn test_remove_terminal_is_idempotent() {
        let mut store = QueueStore::new();
        let ids = store.enqueue([source("a.xlsx", 1), source("b.xlsx", 1)]);
        store.claim_next().unwrap();
        store.fail(ids[0], "bad").unwrap();

        store.remove_terminal();
        let once = store.snapshot();
        let removed = store.remove_terminal();
        assert!(removed.is_empty());
        assert_eq!(store.snapshot(), once);
    }

    #[test]
    fn test_remove_refuses_converting_item() {
        let mut store = QueueStore::new();
        let ids = store.enqueue([source("a.xlsx", 1), source("b.xlsx", 1)]);
        store.claim_next().unwrap();

        assert_eq!(store.remove(ids[0]), Err(QueueError::ItemConverting(ids[0])));
        assert_eq!(store.remove(ids[1]), Ok(true));
        assert_eq!(store.remove(ids[1]), Ok(false));
        assert_eq!(store.len(), 1);
    }
}

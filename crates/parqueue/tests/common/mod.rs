//! Shared test utilities for parqueue integration tests.
//!
//! `FakeBackend` stands in for the conversion service: every submit takes a
//! fixed (virtual) time, selected file names are rejected with a scripted
//! detail, and successes are appended to an in-memory history.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use parqueue::client::error::Result as ClientResult;
use parqueue::{
    ClientError, ConversionBackend, ConversionError, ConversionResult, CoordinatorOptions,
    HistoryEntry, QueueEvent,
};

/// Generous virtual-time bound for waits; only reached if a test is stuck.
pub const WAIT_LIMIT: Duration = Duration::from_secs(3600);

pub struct FakeBackend {
    delay: Duration,
    delete_delay: Duration,
    rejections: Mutex<HashMap<String, String>>,
    history: Mutex<Vec<HistoryEntry>>,
    submitted: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    next_id: AtomicUsize,
    pub fail_delete: AtomicBool,
    pub fail_list: AtomicBool,
}

impl FakeBackend {
    pub fn new(delay: Duration) -> Arc<Self> {
        Self::with_delete_delay(delay, Duration::ZERO)
    }

    /// Like [`FakeBackend::new`], with history deletes taking `delete_delay`.
    pub fn with_delete_delay(delay: Duration, delete_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            delete_delay,
            rejections: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
            fail_delete: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
        })
    }

    pub fn reject(&self, file_name: &str, detail: &str) {
        self.rejections
            .lock()
            .unwrap()
            .insert(file_name.to_string(), detail.to_string());
    }

    pub fn seed_history(&self, entry: HistoryEntry) {
        self.history.lock().unwrap().push(entry);
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

pub fn history_entry(id: &str, name: &str) -> HistoryEntry {
    HistoryEntry {
        id: id.to_string(),
        original_name: name.to_string(),
        converted_name: None,
        original_size: 2048,
        converted_size: 512,
        elapsed_time: 1.5,
        converted_at: chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap(),
        download_url: format!("/download/{}", id),
    }
}

#[async_trait]
impl ConversionBackend for FakeBackend {
    async fn submit_conversion(
        &self,
        file_bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<ConversionResult, ConversionError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(file_name.to_string());

        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Some(detail) = self.rejections.lock().unwrap().get(file_name) {
            return Err(ConversionError::Rejected(detail.clone()));
        }

        let id = format!("conv-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut entry = history_entry(&id, file_name);
        entry.original_size = file_bytes.len() as u64;
        entry.converted_size = (file_bytes.len() as u64) / 4;
        self.history.lock().unwrap().insert(0, entry.clone());

        Ok(ConversionResult {
            download_url: entry.download_url,
            converted_size: entry.converted_size,
            id: Some(id),
            converted_name: None,
        })
    }

    async fn list_history(&self) -> ClientResult<Vec<HistoryEntry>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "history unavailable",
            )));
        }
        Ok(self.history())
    }

    async fn delete_history_entry(&self, id: &str) -> ClientResult<()> {
        tokio::time::sleep(self.delete_delay).await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        self.history.lock().unwrap().retain(|entry| entry.id != id);
        Ok(())
    }
}

pub fn options() -> CoordinatorOptions {
    CoordinatorOptions {
        tick_interval: Duration::from_millis(100),
        conversion_timeout: None,
        refresh_history_on_start: false,
        event_capacity: 4096,
    }
}

/// Receives events until one matches, returning it together with everything seen.
pub async fn wait_for<F>(
    rx: &mut broadcast::Receiver<QueueEvent>,
    mut matches: F,
) -> (QueueEvent, Vec<QueueEvent>)
where
    F: FnMut(&QueueEvent) -> bool,
{
    bounded(async {
        let mut seen = Vec::new();
        loop {
            let event = rx.recv().await.expect("event channel closed or lagged");
            if matches(&event) {
                return (event, seen);
            }
            seen.push(event);
        }
    })
    .await
}

pub async fn bounded<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(WAIT_LIMIT, fut)
        .await
        .expect("timed out waiting for queue")
}

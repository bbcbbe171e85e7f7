use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a work item, assigned at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Pending,
    Converting,
    Done,
    Error,
}

impl WorkStatus {
    /// `done` and `error` only leave the queue through removal.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkStatus::Done | WorkStatus::Error)
    }

    pub fn can_transition_to(self, next: WorkStatus) -> bool {
        matches!(
            (self, next),
            (WorkStatus::Pending, WorkStatus::Converting)
                | (WorkStatus::Converting, WorkStatus::Done)
                | (WorkStatus::Converting, WorkStatus::Error)
        )
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkStatus::Pending => write!(f, "pending"),
            WorkStatus::Converting => write!(f, "converting"),
            WorkStatus::Done => write!(f, "done"),
            WorkStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Clone)]
enum Payload {
    File(PathBuf),
    Memory(Vec<u8>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::File(path) => f.debug_tuple("File").field(path).finish(),
            Payload::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
        }
    }
}

/// The file to convert, with the metadata captured when it was selected.
///
/// Nothing is read from disk until [`SourceHandle::into_bytes`]. Cloning an
/// in-memory handle copies its bytes.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    name: String,
    declared_size: u64,
    payload: Payload,
}

impl SourceHandle {
    /// Captures name and size from file metadata without reading the contents.
    pub async fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            name,
            declared_size: metadata.len(),
            payload: Payload::File(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_size: bytes.len() as u64,
            payload: Payload::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.payload {
            Payload::File(path) => Some(path),
            Payload::Memory(_) => None,
        }
    }

    /// Loads the contents for upload, moving in-memory bytes out without copying.
    pub async fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        match self.payload {
            Payload::File(path) => tokio::fs::read(path).await,
            Payload::Memory(bytes) => Ok(bytes),
        }
    }

    /// Hands the payload to a conversion. In-memory bytes move to the returned
    /// handle and this one keeps only its name and declared size.
    pub(crate) fn take_payload(&mut self) -> SourceHandle {
        let payload = match &mut self.payload {
            Payload::File(path) => Payload::File(path.clone()),
            Payload::Memory(bytes) => Payload::Memory(std::mem::take(bytes)),
        };
        SourceHandle {
            name: self.name.clone(),
            declared_size: self.declared_size,
            payload,
        }
    }
}

/// One enqueued file and its observable conversion state.
#[derive(Debug)]
pub struct WorkItem {
    pub(crate) id: ItemId,
    pub(crate) source: SourceHandle,
    pub(crate) status: WorkStatus,
    pub(crate) progress_percent: f64,
    pub(crate) elapsed_seconds: Option<f64>,
    pub(crate) remaining_seconds: Option<f64>,
    pub(crate) download_ref: Option<String>,
    pub(crate) converted_size: Option<u64>,
    pub(crate) error_message: Option<String>,
    pub(crate) enqueued_at: DateTime<Utc>,
}

impl WorkItem {
    pub(crate) fn new(source: SourceHandle) -> Self {
        Self {
            id: ItemId::new(),
            source,
            status: WorkStatus::Pending,
            progress_percent: 0.0,
            elapsed_seconds: None,
            remaining_seconds: None,
            download_ref: None,
            converted_size: None,
            error_message: None,
            enqueued_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn declared_size(&self) -> u64 {
        self.source.declared_size()
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    pub fn status(&self) -> WorkStatus {
        self.status
    }

    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    pub fn elapsed_seconds(&self) -> Option<f64> {
        self.elapsed_seconds
    }

    pub fn remaining_seconds(&self) -> Option<f64> {
        self.remaining_seconds
    }

    pub fn download_ref(&self) -> Option<&str> {
        self.download_ref.as_deref()
    }

    pub fn converted_size(&self) -> Option<u64> {
        self.converted_size
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn snapshot(&self) -> WorkItemSnapshot {
        WorkItemSnapshot {
            id: self.id,
            name: self.name().to_string(),
            declared_size: self.declared_size(),
            status: self.status,
            progress_percent: self.progress_percent,
            elapsed_seconds: self.elapsed_seconds,
            remaining_seconds: self.remaining_seconds,
            download_ref: self.download_ref.clone(),
            converted_size: self.converted_size,
            error_message: self.error_message.clone(),
            enqueued_at: self.enqueued_at,
        }
    }
}

/// Partial update applied through [`crate::queue::QueueStore::patch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub status: Option<WorkStatus>,
    pub progress_percent: Option<f64>,
    pub elapsed_seconds: Option<f64>,
    pub remaining_seconds: Option<f64>,
    pub download_ref: Option<String>,
    pub converted_size: Option<u64>,
    pub error_message: Option<String>,
}

impl ItemPatch {
    pub fn status(mut self, status: WorkStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, percent: f64) -> Self {
        self.progress_percent = Some(percent);
        self
    }

    pub fn elapsed(mut self, seconds: f64) -> Self {
        self.elapsed_seconds = Some(seconds);
        self
    }

    pub fn remaining(mut self, seconds: f64) -> Self {
        self.remaining_seconds = Some(seconds);
        self
    }

    pub fn download_ref(mut self, locator: impl Into<String>) -> Self {
        self.download_ref = Some(locator.into());
        self
    }

    pub fn converted_size(mut self, bytes: u64) -> Self {
        self.converted_size = Some(bytes);
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == ItemPatch::default()
    }
}

/// Display copy of a work item, without the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemSnapshot {
    pub id: ItemId,
    pub name: String,
    pub declared_size: u64,
    pub status: WorkStatus,
    pub progress_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

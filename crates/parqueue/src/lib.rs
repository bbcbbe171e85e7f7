pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod history;
pub mod queue;

pub use broadcast::{QueueEvent, QueueEventBroadcaster};
pub use client::{
    ClientError, ConversionBackend, ConversionError, ConversionResult, HistoryEntry,
    HttpConversionClient,
};
pub use config::{load_config, ClientConfig};
pub use error::{ConfigError, ParqueueError, QueueError, Result};
pub use history::HistoryView;
pub use queue::{
    CoordinatorOptions, ItemId, QueueCoordinator, QueueHandle, QueueSnapshot, SourceHandle,
    WorkStatus,
};

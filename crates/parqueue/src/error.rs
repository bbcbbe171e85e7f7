use std::path::PathBuf;
use thiserror::Error;

use crate::client::ClientError;
use crate::queue::{ItemId, WorkStatus};

#[derive(Error, Debug)]
pub enum ParqueueError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Item {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ItemId,
        from: WorkStatus,
        to: WorkStatus,
    },

    #[error("Item {requested} cannot start: item {active} is already converting")]
    AlreadyConverting { requested: ItemId, active: ItemId },

    #[error("Invalid update for item {id}: {reason}")]
    InvalidPatch { id: ItemId, reason: &'static str },

    #[error("Item {0} is converting and cannot be removed")]
    ItemConverting(ItemId),

    #[error("Queue coordinator has shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, ParqueueError>;

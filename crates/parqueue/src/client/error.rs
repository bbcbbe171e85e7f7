//! Conversion service error types.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single `submit_conversion` call.
///
/// The `Display` output is what ends up in a work item's error message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The service answered with a non-success status; carries its detail verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("Conversion request failed: {0}")]
    Transport(String),

    #[error("Invalid conversion response: {0}")]
    MalformedResponse(String),

    /// The source payload could not be read before upload.
    #[error("Could not read source file: {0}")]
    Source(String),

    #[error("Conversion timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// The conversion task ended without producing a result.
    #[error("Conversion was interrupted: {0}")]
    Interrupted(String),
}

/// Errors from history and download requests.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Invalid download locator '{0}'")]
    InvalidLocator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

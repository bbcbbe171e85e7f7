//! Remote conversion service access.

pub mod error;
pub mod http;
pub mod types;

use async_trait::async_trait;

pub use error::{ClientError, ConversionError};
pub use http::{resolve_locator, HttpConversionClient};
pub use types::{ConversionResult, HistoryEntry};

/// The operations the queue needs from the conversion service.
#[async_trait]
pub trait ConversionBackend: Send + Sync + 'static {
    async fn submit_conversion(
        &self,
        file_bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<ConversionResult, ConversionError>;

    async fn list_history(&self) -> error::Result<Vec<HistoryEntry>>;

    async fn delete_history_entry(&self, id: &str) -> error::Result<()>;
}

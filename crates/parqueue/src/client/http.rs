//! reqwest-backed client for the conversion service.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;

use super::error::{ClientError, ConversionError, Result};
use super::types::{ConversionResult, ErrorBody, HistoryEntry};
use super::ConversionBackend;
use crate::config::ClientConfig;

/// Maximum length for error bodies echoed into errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Multipart field name the service reads the upload from.
const FILE_FIELD: &str = "file";

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

/// Extracts the user-facing message from a non-success conversion response.
pub(crate) fn rejection_detail(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .and_then(|detail| match detail {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        })
        .filter(|s| !s.trim().is_empty());

    detail.unwrap_or_else(|| format!("Conversion failed (HTTP {})", status.as_u16()))
}

/// Resolves a service-relative download locator against the base address.
/// Absolute `http(s)://` locators are returned unchanged.
pub fn resolve_locator(base_url: &str, locator: &str) -> std::result::Result<String, ClientError> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(ClientError::InvalidLocator(locator.to_string()));
    }
    if locator.starts_with("http://") || locator.starts_with("https://") {
        return Ok(locator.to_string());
    }
    Ok(format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        locator.trim_start_matches('/')
    ))
}

/// HTTP implementation of [`ConversionBackend`].
#[derive(Clone)]
pub struct HttpConversionClient {
    client: Client,
    base_url: String,
    history_timeout: Duration,
}

impl HttpConversionClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            history_timeout: config.history_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Downloads a converted artifact to `dest`, returning the number of bytes written.
    pub async fn download(&self, locator: &str, dest: &Path) -> Result<u64> {
        let url = resolve_locator(&self.base_url, locator)?;
        info!("Downloading {} to {}", url, dest.display());

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Downloaded {} bytes to {}", written, dest.display());
        Ok(written)
    }
}

#[async_trait]
impl ConversionBackend for HttpConversionClient {
    async fn submit_conversion(
        &self,
        file_bytes: Vec<u8>,
        file_name: &str,
    ) -> std::result::Result<ConversionResult, ConversionError> {
        let size = file_bytes.len();
        let part = Part::bytes(file_bytes).file_name(file_name.to_string());
        let form = Form::new().part(FILE_FIELD, part);

        debug!("Submitting {} ({} bytes) for conversion", file_name, size);

        let response = self
            .client
            .post(self.endpoint("/convert"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ConversionError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            debug!(
                "Conversion of {} rejected ({}): {}",
                file_name,
                status,
                truncate_body(&body)
            );
            return Err(ConversionError::Rejected(rejection_detail(status, &body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ConversionError::Transport(e.to_string()))?;
        serde_json::from_str::<ConversionResult>(&body)
            .map_err(|e| ConversionError::MalformedResponse(e.to_string()))
    }

    async fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        let response = self
            .client
            .get(self.endpoint("/history"))
            .timeout(self.history_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        Ok(response.json().await?)
    }

    async fn delete_history_entry(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.endpoint(&format!("/history/{}", id)))
            .timeout(self.history_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        Ok(())
    }
}

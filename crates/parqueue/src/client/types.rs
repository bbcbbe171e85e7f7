//! Wire types exchanged with the conversion service.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Successful response body of `POST /convert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Relative locator of the converted artifact.
    pub download_url: String,
    pub converted_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_name: Option<String>,
}

/// Error response body returned by the service on non-success status codes.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

/// A persisted record of a past successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub original_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_name: Option<String>,
    pub original_size: u64,
    pub converted_size: u64,
    /// Service-side conversion time in seconds.
    pub elapsed_time: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub converted_at: NaiveDateTime,
    pub download_url: String,
}

impl HistoryEntry {
    /// File name to save the converted artifact under.
    pub fn output_file_name(&self) -> String {
        if let Some(name) = &self.converted_name {
            return name.clone();
        }
        let stem = std::path::Path::new(&self.original_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.id.clone());
        format!("{}.parquet", stem)
    }
}

/// Accepts RFC 3339 timestamps as well as naive ISO-8601 ones
/// (`2024-01-15T10:30:00.123456`), which the service emits by default.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid timestamp '{}'", raw))
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

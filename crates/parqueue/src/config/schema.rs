use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for talking to the conversion service and driving the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Progress estimator tick while a conversion is in flight.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound on a single conversion. `null` waits forever.
    #[serde(default = "default_conversion_timeout_secs")]
    pub conversion_timeout_secs: Option<u64>,
    #[serde(default = "default_history_timeout_secs")]
    pub history_timeout_secs: u64,
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
    #[serde(default = "default_true")]
    pub refresh_history_on_start: bool,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_conversion_timeout_secs() -> Option<u64> {
    Some(600)
}

fn default_history_timeout_secs() -> u64 {
    30
}

fn default_accepted_extensions() -> Vec<String> {
    vec!["xlsx".to_string(), "xls".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            tick_interval_ms: default_tick_interval_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            conversion_timeout_secs: default_conversion_timeout_secs(),
            history_timeout_secs: default_history_timeout_secs(),
            accepted_extensions: default_accepted_extensions(),
            refresh_history_on_start: true,
            event_capacity: default_event_capacity(),
        }
    }
}

impl ClientConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn conversion_timeout(&self) -> Option<Duration> {
        self.conversion_timeout_secs.map(Duration::from_secs)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_secs(self.history_timeout_secs)
    }

    /// Returns true if the path carries one of the accepted spreadsheet extensions.
    pub fn is_accepted(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.accepted_extensions
                    .iter()
                    .any(|accepted| accepted.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use parqueue::config::{default_config_path, validate_config};
use parqueue::queue::WorkItemSnapshot;
use parqueue::{load_config, ClientConfig, QueueSnapshot, WorkStatus};

use crate::cli::LogFormat;

pub const BASE_URL_ENV: &str = "PARQUEUE_BASE_URL";

/// Installs the global subscriber and routes `log` records from the library into it.
///
/// `RUST_LOG` takes precedence over `verbose`.
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    installed.context("installing tracing subscriber")?;

    tracing_log::LogTracer::init().context("bridging log records")?;
    Ok(())
}

/// Loads the client configuration and applies address overrides.
///
/// An explicit `--config` must exist; the per-user default file is optional.
pub fn resolve_config(
    explicit: Option<&Path>,
    base_url_flag: Option<&str>,
    base_url_env: Option<String>,
) -> Result<ClientConfig> {
    let mut config = match explicit {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config: {}", path.display()))?,
        None => match default_config_path().filter(|path| path.exists()) {
            Some(path) => load_config(&path)
                .with_context(|| format!("loading config: {}", path.display()))?,
            None => ClientConfig::default(),
        },
    };

    if let Some(url) = base_url_flag.map(str::to_string).or(base_url_env) {
        config.base_url = url;
    }
    validate_config(&config).context("invalid configuration")?;

    Ok(config)
}

/// Splits arguments into files the service accepts and skipped ones.
pub fn partition_files(config: &ClientConfig, files: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
    files.into_iter().partition(|path| config.is_accepted(path))
}

/// Fallback name for a converted artifact: `<stem>.parquet`.
pub fn parquet_file_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source_name.to_string());
    format!("{}.parquet", stem)
}

/// Outcome of a `convert` run, taken from the coordinator's final queue.
#[derive(Debug)]
pub struct Summary {
    pub converted: Vec<WorkItemSnapshot>,
    pub failed: usize,
    pub unfinished: usize,
}

impl Summary {
    pub fn from_snapshot(snapshot: &QueueSnapshot) -> Self {
        let converted: Vec<WorkItemSnapshot> = snapshot
            .items
            .iter()
            .filter(|item| item.status == WorkStatus::Done)
            .cloned()
            .collect();
        let failed = snapshot.count(WorkStatus::Error);
        Self {
            unfinished: snapshot.items.len() - converted.len() - failed,
            converted,
            failed,
        }
    }

    pub fn total(&self) -> usize {
        self.converted.len() + self.failed + self.unfinished
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.unfinished == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} converted, {} failed, {} not finished",
            self.converted.len(),
            self.failed,
            self.unfinished
        )
    }
}

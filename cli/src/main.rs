mod app;
mod cli;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

use parqueue::client::ConversionBackend;
use parqueue::format::format_size;
use parqueue::{
    ClientConfig, CoordinatorOptions, HttpConversionClient, QueueCoordinator, QueueEvent,
    QueueSnapshot, SourceHandle,
};

use crate::cli::{Cli, Command};
use crate::render::EventRenderer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    app::init_tracing(cli.verbose, cli.log_format)?;

    let config = app::resolve_config(
        cli.config.as_deref(),
        cli.base_url.as_deref(),
        std::env::var(app::BASE_URL_ENV).ok(),
    )?;
    let client = HttpConversionClient::new(&config).context("building HTTP client")?;
    info!("Using conversion service at {}", client.base_url());

    match cli.command {
        Command::Convert { files, output_dir } => convert(&config, client, files, output_dir).await,
        Command::History { json } => history(&client, json).await,
        Command::Delete { id } => delete(&client, &id).await,
        Command::Download { id, output } => download(&client, &id, output).await,
    }
}

async fn convert(
    config: &ClientConfig,
    client: HttpConversionClient,
    files: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let (accepted, skipped) = app::partition_files(config, files);
    for path in &skipped {
        warn!("Skipping {}: not a spreadsheet", path.display());
    }
    if accepted.is_empty() {
        bail!("no spreadsheet files to convert");
    }

    let mut sources = Vec::with_capacity(accepted.len());
    for path in &accepted {
        let source = SourceHandle::from_path(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        sources.push(source);
    }

    let mut options = CoordinatorOptions::from(config);
    options.refresh_history_on_start = false;

    let client = Arc::new(client);
    let (handle, mut task) = QueueCoordinator::spawn(client.clone(), options);
    let mut events = handle.subscribe();
    handle.enqueue(sources).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut renderer = EventRenderer::new();
    let mut interrupted = false;
    let mut finished: Option<QueueSnapshot> = None;

    loop {
        tokio::select! {
            biased;

            event = events.recv() => match event {
                Ok(QueueEvent::Drained) => break,
                Ok(event) => {
                    if let Some(line) = renderer.render(&event) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Display fell behind by {} events", missed);
                    // Drained may have been among the missed events.
                    if matches!(handle.snapshot().await, Ok(current) if current.is_idle()) {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                warn!("Interrupted; waiting for the active conversion to finish");
                interrupted = true;
                handle.shutdown().await?;
            }
            joined = &mut task, if interrupted && finished.is_none() => {
                finished = Some(joined.context("queue task failed")?);
                break;
            }
        }
    }

    let last = match finished {
        Some(last) => last,
        None => {
            if !interrupted {
                handle.shutdown().await?;
            }
            task.await.context("queue task failed")?
        }
    };

    let summary = app::Summary::from_snapshot(&last);
    println!("{}", summary);

    if let Some(dir) = output_dir {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        for item in &summary.converted {
            let Some(locator) = item.download_ref.as_deref() else {
                continue;
            };
            let dest = dir.join(app::parquet_file_name(&item.name));
            let written = client
                .download(locator, &dest)
                .await
                .with_context(|| format!("downloading {}", item.name))?;
            println!("saved {} ({})", dest.display(), format_size(written));
        }
    }

    if !summary.is_success() {
        bail!(
            "{} of {} file(s) did not convert",
            summary.failed + summary.unfinished,
            summary.total()
        );
    }
    Ok(())
}

async fn history(client: &HttpConversionClient, json: bool) -> Result<()> {
    let entries = client.list_history().await.context("fetching history")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("{}", render::history_table(&entries).trim_end());
    }
    Ok(())
}

async fn delete(client: &HttpConversionClient, id: &str) -> Result<()> {
    client
        .delete_history_entry(id)
        .await
        .with_context(|| format!("deleting history entry {}", id))?;
    let remaining = client.list_history().await.context("fetching history")?;
    println!("Deleted {}; {} entries remain", id, remaining.len());
    Ok(())
}

async fn download(client: &HttpConversionClient, id: &str, output: Option<PathBuf>) -> Result<()> {
    let entries = client.list_history().await.context("fetching history")?;
    let Some(entry) = entries.iter().find(|entry| entry.id == id) else {
        bail!("no history entry with id {}", id);
    };

    let dest = output.unwrap_or_else(|| PathBuf::from(entry.output_file_name()));
    let written = client
        .download(&entry.download_url, &dest)
        .await
        .with_context(|| format!("downloading {}", entry.original_name))?;
    println!("saved {} ({})", dest.display(), format_size(written));
    Ok(())
}

//! Single-task control loop that serializes conversions.
//!
//! The coordinator owns the [`QueueStore`] and the [`HistoryView`]; every
//! mutation happens on its task, one command or timer event at a time. At
//! most one conversion is in flight. Its estimator tick lives in the same
//! [`InFlight`] value as the conversion task, so both are torn down in the
//! step that writes the terminal status.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::Instrument;

use crate::broadcast::{QueueEvent, QueueEventBroadcaster};
use crate::client::{ConversionBackend, ConversionError, ConversionResult, HistoryEntry};
use crate::config::ClientConfig;
use crate::error::QueueError;
use crate::format::format_size;
use crate::history::HistoryView;
use crate::queue::command::{QueueCommand, QueueSnapshot};
use crate::queue::item::{ItemId, SourceHandle};
use crate::queue::progress::{LinearEstimate, ProgressModel};
use crate::queue::store::QueueStore;

const COMMAND_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub tick_interval: Duration,
    /// `None` lets a conversion run until the service answers.
    pub conversion_timeout: Option<Duration>,
    pub refresh_history_on_start: bool,
    pub event_capacity: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        CoordinatorOptions::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for CoordinatorOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            conversion_timeout: config.conversion_timeout(),
            refresh_history_on_start: config.refresh_history_on_start,
            event_capacity: config.event_capacity,
        }
    }
}

/// Cloneable front end for a running [`QueueCoordinator`].
#[derive(Clone)]
pub struct QueueHandle {
    command_tx: mpsc::Sender<QueueCommand>,
    events: QueueEventBroadcaster,
}

impl QueueHandle {
    /// Adds the sources to the back of the queue. An empty batch is a no-op.
    pub async fn enqueue(&self, sources: Vec<SourceHandle>) -> Result<Vec<ItemId>, QueueError> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(QueueCommand::Enqueue {
            sources,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| QueueError::Shutdown)
    }

    /// Drops a pending or finished item from the queue.
    pub async fn remove(&self, id: ItemId) -> Result<bool, QueueError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(QueueCommand::Remove {
            id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| QueueError::Shutdown)?
    }

    /// Removes every `done` and `error` item, returning their ids.
    pub async fn clear_completed(&self) -> Result<Vec<ItemId>, QueueError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(QueueCommand::ClearCompleted { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(|_| QueueError::Shutdown)
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, QueueError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(QueueCommand::Snapshot { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| QueueError::Shutdown)
    }

    pub async fn refresh_history(&self) -> Result<(), QueueError> {
        self.send(QueueCommand::RefreshHistory).await
    }

    /// Requests deletion of a history entry; the view is refreshed afterwards
    /// whether or not the delete succeeded.
    pub async fn delete_history(&self, id: impl Into<String>) -> Result<(), QueueError> {
        self.send(QueueCommand::DeleteHistory { id: id.into() })
            .await
    }

    /// Stops accepting commands. An in-flight conversion is allowed to settle.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.send(QueueCommand::Shutdown).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: QueueCommand) -> Result<(), QueueError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| QueueError::Shutdown)
    }
}

struct InFlight {
    id: ItemId,
    declared_size: u64,
    started: Instant,
    ticker: Interval,
    task: JoinHandle<Result<ConversionResult, ConversionError>>,
}

enum FlightEvent {
    Tick,
    Settled(Result<Result<ConversionResult, ConversionError>, JoinError>),
}

/// Results of detached history work, delivered back to the coordinator task.
enum HistoryMessage {
    Fetched {
        generation: u64,
        entries: Vec<HistoryEntry>,
    },
    /// A delete finished, successfully or not. The follow-up list is issued
    /// from the coordinator so it draws a fresh generation.
    DeleteSettled,
}

pub struct QueueCoordinator {
    store: QueueStore,
    history: HistoryView,
    backend: Arc<dyn ConversionBackend>,
    model: Arc<dyn ProgressModel>,
    options: CoordinatorOptions,
    events: QueueEventBroadcaster,
    command_rx: mpsc::Receiver<QueueCommand>,
    history_tx: mpsc::UnboundedSender<HistoryMessage>,
    history_rx: mpsc::UnboundedReceiver<HistoryMessage>,
    in_flight: Option<InFlight>,
    shutting_down: bool,
}

impl QueueCoordinator {
    pub fn new(
        backend: Arc<dyn ConversionBackend>,
        options: CoordinatorOptions,
    ) -> (Self, QueueHandle) {
        Self::with_model(backend, Arc::new(LinearEstimate), options)
    }

    pub fn with_model(
        backend: Arc<dyn ConversionBackend>,
        model: Arc<dyn ProgressModel>,
        options: CoordinatorOptions,
    ) -> (Self, QueueHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (history_tx, history_rx) = mpsc::unbounded_channel();
        let events = QueueEventBroadcaster::new(options.event_capacity);

        let handle = QueueHandle {
            command_tx,
            events: events.clone(),
        };
        let coordinator = Self {
            store: QueueStore::new(),
            history: HistoryView::new(),
            backend,
            model,
            options,
            events,
            command_rx,
            history_tx,
            history_rx,
            in_flight: None,
            shutting_down: false,
        };
        (coordinator, handle)
    }

    /// Creates a coordinator and runs it on a new tokio task. The task resolves
    /// to the queue as it stood when the coordinator stopped.
    pub fn spawn(
        backend: Arc<dyn ConversionBackend>,
        options: CoordinatorOptions,
    ) -> (QueueHandle, JoinHandle<QueueSnapshot>) {
        let (coordinator, handle) = Self::new(backend, options);
        let task = tokio::spawn(coordinator.run());
        (handle, task)
    }

    pub async fn run(mut self) -> QueueSnapshot {
        debug!("Queue coordinator started");
        if self.options.refresh_history_on_start {
            self.refresh_history();
        }

        loop {
            self.schedule();

            if self.shutting_down && self.in_flight.is_none() {
                break;
            }

            tokio::select! {
                biased;

                event = next_flight_event(&mut self.in_flight) => match event {
                    FlightEvent::Tick => self.on_tick(),
                    FlightEvent::Settled(outcome) => self.on_settled(outcome),
                },

                Some(message) = self.history_rx.recv() => {
                    self.on_history(message);
                }

                command = self.command_rx.recv(), if !self.shutting_down => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All queue handles dropped");
                        self.shutting_down = true;
                    }
                },
            }
        }

        info!("Queue coordinator stopped");
        self.snapshot()
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.store.snapshot(),
            history: self.history.entries().to_vec(),
        }
    }

    fn handle_command(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Enqueue { sources, reply } => {
                let ids = self.store.enqueue(sources);
                if !ids.is_empty() {
                    debug!("Enqueued {} item(s)", ids.len());
                    let items = ids
                        .iter()
                        .filter_map(|id| self.store.get(*id))
                        .map(|item| item.snapshot())
                        .collect();
                    self.events.send(QueueEvent::ItemsAdded { items });
                }
                let _ = reply.send(ids);
            }
            QueueCommand::Remove { id, reply } => {
                let result = self.store.remove(id);
                if let Ok(true) = result {
                    self.events.send(QueueEvent::ItemsRemoved { ids: vec![id] });
                }
                let _ = reply.send(result);
            }
            QueueCommand::ClearCompleted { reply } => {
                let removed = self.store.remove_terminal();
                if !removed.is_empty() {
                    debug!("Cleared {} finished item(s)", removed.len());
                    self.events.send(QueueEvent::ItemsRemoved {
                        ids: removed.clone(),
                    });
                }
                let _ = reply.send(removed);
            }
            QueueCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            QueueCommand::RefreshHistory => self.refresh_history(),
            QueueCommand::DeleteHistory { id } => self.delete_history(id),
            QueueCommand::Shutdown => {
                info!("Queue coordinator shutting down");
                self.shutting_down = true;
            }
        }
    }

    /// Starts the next pending item if nothing is in flight.
    fn schedule(&mut self) {
        if self.in_flight.is_some() || self.shutting_down {
            return;
        }
        let Some(claim) = self.store.claim_next() else {
            return;
        };

        let declared_size = claim.source.declared_size();
        let name = claim.source.name().to_string();
        let started = Instant::now();
        self.store
            .record_progress(claim.id, &self.model.estimate(declared_size, Duration::ZERO));

        info!("Converting {} ({})", name, format_size(declared_size));
        self.events.send(QueueEvent::ItemStarted {
            id: claim.id,
            name: name.clone(),
        });

        let span = tracing::info_span!("conversion", item = %claim.id, file = %name);
        let task = tokio::spawn(
            run_conversion(
                Arc::clone(&self.backend),
                claim.source,
                self.options.conversion_timeout,
            )
            .instrument(span),
        );

        let mut ticker =
            tokio::time::interval_at(started + self.options.tick_interval, self.options.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.in_flight = Some(InFlight {
            id: claim.id,
            declared_size,
            started,
            ticker,
            task,
        });
    }

    fn on_tick(&mut self) {
        let Some(flight) = &self.in_flight else {
            return;
        };
        let estimate = self
            .model
            .estimate(flight.declared_size, flight.started.elapsed());
        let id = flight.id;

        if self.store.record_progress(id, &estimate) {
            if let Some(item) = self.store.get(id) {
                self.events.send(QueueEvent::ItemProgress {
                    id,
                    progress_percent: item.progress_percent(),
                    elapsed_seconds: item.elapsed_seconds(),
                    remaining_seconds: item.remaining_seconds(),
                });
            }
        }
    }

    fn on_settled(&mut self, outcome: Result<Result<ConversionResult, ConversionError>, JoinError>) {
        // Clearing the in-flight slot also drops the ticker.
        let Some(flight) = self.in_flight.take() else {
            return;
        };
        let id = flight.id;
        let elapsed = flight.started.elapsed();
        drop(flight);

        let outcome = outcome.unwrap_or_else(|e| Err(ConversionError::Interrupted(e.to_string())));

        match outcome {
            Ok(result) => match self.store.complete(id, &result, elapsed) {
                Ok(true) => {
                    info!(
                        "Converted item {} in {:.1}s ({})",
                        id,
                        elapsed.as_secs_f64(),
                        format_size(result.converted_size)
                    );
                    if let Some(item) = self.store.get(id) {
                        self.events.send(QueueEvent::ItemCompleted {
                            item: item.snapshot(),
                        });
                    }
                    self.refresh_history();
                }
                Ok(false) => debug!("Item {} left the queue before completing", id),
                Err(e) => error!("Failed to record completion of {}: {}", id, e),
            },
            Err(err) => {
                let message = err.to_string();
                warn!("Conversion of item {} failed: {}", id, message);
                match self.store.fail(id, &message) {
                    Ok(true) => {
                        if let Some(item) = self.store.get(id) {
                            self.events.send(QueueEvent::ItemFailed {
                                item: item.snapshot(),
                            });
                        }
                    }
                    Ok(false) => debug!("Item {} left the queue before failing", id),
                    Err(e) => error!("Failed to record failure of {}: {}", id, e),
                }
            }
        }

        self.schedule();
        if self.in_flight.is_none() && !self.store.has_pending() {
            self.events.send(QueueEvent::Drained);
        }
    }

    fn on_history(&mut self, message: HistoryMessage) {
        match message {
            HistoryMessage::Fetched {
                generation,
                entries,
            } => {
                if self.history.apply(generation, entries) {
                    debug!("History refreshed ({} entries)", self.history.entries().len());
                    self.events.send(QueueEvent::HistoryUpdated {
                        entries: self.history.entries().len(),
                    });
                } else {
                    debug!("Discarding stale history refresh {}", generation);
                }
            }
            HistoryMessage::DeleteSettled => self.refresh_history(),
        }
    }

    fn refresh_history(&mut self) {
        let generation = self.history.begin_refresh();
        let backend = Arc::clone(&self.backend);
        let tx = self.history_tx.clone();
        tokio::spawn(fetch_history(backend, generation, tx));
    }

    fn delete_history(&self, id: String) {
        let backend = Arc::clone(&self.backend);
        let tx = self.history_tx.clone();
        tokio::spawn(async move {
            match backend.delete_history_entry(&id).await {
                Ok(()) => info!("Deleted history entry {}", id),
                Err(e) => warn!("Failed to delete history entry {}: {}", id, e),
            }
            let _ = tx.send(HistoryMessage::DeleteSettled);
        });
    }
}

async fn next_flight_event(in_flight: &mut Option<InFlight>) -> FlightEvent {
    match in_flight {
        Some(flight) => tokio::select! {
            biased;
            outcome = &mut flight.task => FlightEvent::Settled(outcome),
            _ = flight.ticker.tick() => FlightEvent::Tick,
        },
        None => std::future::pending().await,
    }
}

async fn run_conversion(
    backend: Arc<dyn ConversionBackend>,
    source: SourceHandle,
    timeout: Option<Duration>,
) -> Result<ConversionResult, ConversionError> {
    let name = source.name().to_string();
    let bytes = source
        .into_bytes()
        .await
        .map_err(|e| ConversionError::Source(e.to_string()))?;
    let submit = backend.submit_conversion(bytes, &name);

    match timeout {
        Some(limit) => tokio::time::timeout(limit, submit)
            .await
            .map_err(|_| ConversionError::TimedOut(limit))?,
        None => submit.await,
    }
}

async fn fetch_history(
    backend: Arc<dyn ConversionBackend>,
    generation: u64,
    tx: mpsc::UnboundedSender<HistoryMessage>,
) {
    match backend.list_history().await {
        Ok(entries) => {
            let _ = tx.send(HistoryMessage::Fetched {
                generation,
                entries,
            });
        }
        Err(e) => warn!("Failed to refresh history: {}", e),
    }
}

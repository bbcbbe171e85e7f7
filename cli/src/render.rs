//! Terminal output for queue events and history listings.

use std::collections::HashMap;

use parqueue::format::{format_duration, format_remaining, format_size, format_timestamp};
use parqueue::queue::WorkItemSnapshot;
use parqueue::{HistoryEntry, ItemId, QueueEvent};

/// Progress lines are printed once per this many percent.
const PROGRESS_STEP: f64 = 10.0;

/// Turns queue events into printable lines, throttling progress updates.
#[derive(Default)]
pub struct EventRenderer {
    names: HashMap<ItemId, String>,
    last_step: HashMap<ItemId, u32>,
}

impl EventRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &QueueEvent) -> Option<String> {
        match event {
            QueueEvent::ItemsAdded { items } => {
                for item in items {
                    self.names.insert(item.id, item.name.clone());
                }
                Some(format!("queued {} file(s)", items.len()))
            }
            QueueEvent::ItemStarted { id, name } => {
                self.names.insert(*id, name.clone());
                self.last_step.insert(*id, 0);
                Some(format!("{:<32} converting", name))
            }
            QueueEvent::ItemProgress {
                id,
                progress_percent,
                remaining_seconds,
                ..
            } => {
                let step = (progress_percent / PROGRESS_STEP).floor() as u32;
                let last = self.last_step.entry(*id).or_insert(0);
                if step <= *last {
                    return None;
                }
                *last = step;
                Some(format!(
                    "{:<32} {:>5.1}%  remaining {}",
                    self.name(*id),
                    progress_percent,
                    format_remaining(*remaining_seconds)
                ))
            }
            QueueEvent::ItemCompleted { item } => {
                self.last_step.remove(&item.id);
                Some(completed_line(item))
            }
            QueueEvent::ItemFailed { item } => {
                self.last_step.remove(&item.id);
                Some(format!(
                    "{:<32} failed: {}",
                    item.name,
                    item.error_message.as_deref().unwrap_or("unknown error")
                ))
            }
            QueueEvent::ItemsRemoved { .. }
            | QueueEvent::HistoryUpdated { .. }
            | QueueEvent::Drained => None,
        }
    }

    fn name(&self, id: ItemId) -> &str {
        self.names.get(&id).map(String::as_str).unwrap_or("?")
    }
}

fn completed_line(item: &WorkItemSnapshot) -> String {
    format!(
        "{:<32} done in {} ({} -> {})",
        item.name,
        format_duration(item.elapsed_seconds.unwrap_or(0.0)),
        format_size(item.declared_size),
        format_size(item.converted_size.unwrap_or(0))
    )
}

pub fn history_table(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No conversions yet.".to_string();
    }

    let mut out = format!(
        "{:<32} {:>10}    {:>10} {:>8}  {:<16}  {}\n",
        "NAME", "SIZE", "PARQUET", "TIME", "CONVERTED", "ID"
    );
    for entry in entries {
        out.push_str(&format!(
            "{:<32} {:>10} -> {:>10} {:>8}  {:<16}  {}\n",
            entry.original_name,
            format_size(entry.original_size),
            format_size(entry.converted_size),
            format_duration(entry.elapsed_time),
            format_timestamp(&entry.converted_at),
            entry.id
        ));
    }
    out
}

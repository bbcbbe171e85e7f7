//! Upload queue: work items, their store, the progress estimator and the
//! coordinator that drives conversions one at a time.

pub mod command;
pub mod coordinator;
pub mod item;
pub mod progress;
pub mod store;

pub use command::{QueueCommand, QueueSnapshot};
pub use coordinator::{CoordinatorOptions, QueueCoordinator, QueueHandle};
pub use item::{ItemId, ItemPatch, SourceHandle, WorkItem, WorkItemSnapshot, WorkStatus};
pub use progress::{estimate, estimated_total_seconds, Estimate, LinearEstimate, ProgressModel};
pub use store::{Claim, QueueStore};

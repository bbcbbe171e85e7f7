//! Broadcasting of queue state changes to any number of observers.

pub mod queue_events;

pub use queue_events::{QueueEvent, QueueEventBroadcaster};

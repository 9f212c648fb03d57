//! Event Store — append-only observability log for tool calls, sessions,
//! mail, and errors across a run.

mod store;
mod types;

pub use store::{Correlation, EventStore, EventStoreError, EventResult};
pub use types::{EventQuery, EventType, Level, NewEvent, PurgeOptions, StoredEvent, ToolStats};

//! Recorder sessions: task lifecycle, pass bookkeeping, persistence

mod recorder;
mod registry;
mod task;

pub use recorder::Recorder;
pub use registry::RecorderRegistry;
pub use task::{Task, TaskEvent, TaskOutcome, TaskOutput};

/// Maximum number of concurrently registered recorders
pub const MAX_RECORDERS: usize = 1024;

/// Capacity of a recorder's task-event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

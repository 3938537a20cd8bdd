//! Flowsmith Scheduler
//!
//! Runs every task of a [`TaskGraph`](flowsmith_graph::TaskGraph) through the
//! node pipeline in dependency order. A task starts only after all of its
//! predecessors have published their results, and receives their output
//! descriptions as context. Independent ready tasks run concurrently.

mod error;
mod events;
mod registry;
mod report;
mod scheduler;

pub use error::SchedulerError;
pub use events::{ChannelNotifier, ExecutionNotifier, NoopNotifier, RunEvent};
pub use registry::TaskRegistry;
pub use report::RunReport;
pub use scheduler::{Scheduler, SchedulerConfig};

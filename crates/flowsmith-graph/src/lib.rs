//! Flowsmith Graph
//!
//! This crate provides the validated task graph for flowsmith. A task graph
//! is the resolved form of a plan that is ready for scheduling.
//!
//! Key differences from `flowsmith-config`:
//! - Tasks are referenced by content-derived [`TaskId`]s, not action labels
//! - Every downstream reference points at a task in the same graph
//! - Roots, terminals and predecessors are available through [`Graph`]

mod error;
mod graph;
mod task;
mod task_graph;

pub use error::GraphError;
pub use graph::Graph;
pub use task::{Task, TaskId};
pub use task_graph::TaskGraph;

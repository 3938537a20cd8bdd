use flowsmith_graph::GraphError;
use thiserror::Error;

/// Errors that can occur during plan resolution.
#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
  /// The resolved edges do not form a valid graph.
  #[error(transparent)]
  Graph(#[from] GraphError),

  /// Cycle detected in the task graph.
  #[error("cycle detected in task graph at '{task}'")]
  CycleDetected { task: String },

  /// A task descriptor has a blank action label.
  #[error("task at position {index} has an empty action")]
  EmptyAction { index: usize },
}

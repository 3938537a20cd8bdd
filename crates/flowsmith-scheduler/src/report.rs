use std::collections::BTreeMap;

use flowsmith_graph::{TaskGraph, TaskId};
use flowsmith_pipeline::{MergeInput, NodeOutcome};
use serde::Serialize;

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub run_id: String,
  pub roots: Vec<TaskId>,
  pub terminals: Vec<TaskId>,
  /// Execution order, every task after its predecessors.
  pub order: Vec<TaskId>,
  pub outcomes: BTreeMap<TaskId, NodeOutcome>,
  /// The input graph with each task's artifact and output description filled in.
  pub graph: TaskGraph,
}

impl RunReport {
  pub fn outcome(&self, id: &TaskId) -> Option<&NodeOutcome> {
    self.outcomes.get(id)
  }

  /// Produced artifacts in execution order, for [`flowsmith_pipeline::Merger`].
  pub fn merge_inputs(&self) -> Vec<MergeInput> {
    self
      .order
      .iter()
      .filter_map(|id| {
        let task = self.graph.get(id)?;
        let artifact = task.artifact.clone()?;
        Some(MergeInput {
          action: task.action.clone(),
          integration: task.integration.clone(),
          artifact,
        })
      })
      .collect()
  }
}

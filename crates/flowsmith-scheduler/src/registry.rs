use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use flowsmith_graph::{TaskGraph, TaskId};
use flowsmith_pipeline::{NodeOutcome, PredecessorOutput};

use crate::error::SchedulerError;

/// Published task results for one run.
///
/// Each task publishes exactly once, from its own pipeline. Readers see either
/// nothing or the complete outcome for a task.
#[derive(Clone, Default)]
pub struct TaskRegistry {
  entries: Arc<RwLock<BTreeMap<TaskId, NodeOutcome>>>,
}

impl TaskRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Publish a task's outcome. A second publish for the same task is rejected.
  pub fn publish(&self, outcome: NodeOutcome) -> Result<(), SchedulerError> {
    let mut entries = self
      .entries
      .write()
      .map_err(|_| SchedulerError::RegistryPoisoned)?;
    if entries.contains_key(&outcome.task_id) {
      return Err(SchedulerError::AlreadyPublished {
        task_id: outcome.task_id.to_string(),
      });
    }
    entries.insert(outcome.task_id, outcome);
    Ok(())
  }

  pub fn published(&self) -> Result<BTreeSet<TaskId>, SchedulerError> {
    let entries = self
      .entries
      .read()
      .map_err(|_| SchedulerError::RegistryPoisoned)?;
    Ok(entries.keys().copied().collect())
  }

  pub fn get(&self, id: &TaskId) -> Result<Option<NodeOutcome>, SchedulerError> {
    let entries = self
      .entries
      .read()
      .map_err(|_| SchedulerError::RegistryPoisoned)?;
    Ok(entries.get(id).cloned())
  }

  /// Published outputs of `ids`, in the order given. Unpublished ids are skipped.
  pub fn outputs_for(
    &self,
    ids: &[TaskId],
    graph: &TaskGraph,
  ) -> Result<Vec<PredecessorOutput>, SchedulerError> {
    let entries = self
      .entries
      .read()
      .map_err(|_| SchedulerError::RegistryPoisoned)?;
    Ok(
      ids
        .iter()
        .filter_map(|id| {
          let outcome = entries.get(id)?;
          Some(PredecessorOutput {
            task_id: *id,
            action: graph
              .get(id)
              .map(|t| t.action.clone())
              .unwrap_or_default(),
            output_description: outcome.output_description.clone(),
          })
        })
        .collect(),
    )
  }

  /// All published outcomes.
  pub fn snapshot(&self) -> Result<BTreeMap<TaskId, NodeOutcome>, SchedulerError> {
    let entries = self
      .entries
      .read()
      .map_err(|_| SchedulerError::RegistryPoisoned)?;
    Ok(entries.clone())
  }
}

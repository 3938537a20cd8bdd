use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::Graph;
use crate::task::{Task, TaskId};

/// A validated set of tasks linked by their downstream lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Task>", into = "Vec<Task>")]
pub struct TaskGraph {
  tasks: BTreeMap<TaskId, Task>,
}

impl TaskGraph {
  /// Build a graph, rejecting duplicate identities and dangling references.
  pub fn new(tasks: Vec<Task>) -> Result<Self, GraphError> {
    let mut by_id = BTreeMap::new();
    for task in tasks {
      if by_id.contains_key(&task.id) {
        return Err(GraphError::DuplicateTask {
          task_id: task.id.to_string(),
          action: task.action,
        });
      }
      by_id.insert(task.id, task);
    }

    for task in by_id.values() {
      for target in &task.downstream {
        if !by_id.contains_key(target) {
          return Err(GraphError::DanglingReference {
            task: task.action.clone(),
            reference: target.to_string(),
          });
        }
      }
    }

    Ok(Self { tasks: by_id })
  }

  /// Build the adjacency structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.tasks)
  }

  pub fn get(&self, id: &TaskId) -> Option<&Task> {
    self.tasks.get(id)
  }

  /// Look up a task by its action label.
  pub fn find_by_action(&self, action: &str) -> Option<&Task> {
    self.tasks.get(&TaskId::from_action(action))
  }

  /// Tasks ascending by identity.
  pub fn tasks(&self) -> impl Iterator<Item = &Task> {
    self.tasks.values()
  }

  pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
    self.tasks.keys()
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  /// Record a task's execution results. Returns false for an unknown id.
  pub fn record_output(
    &mut self,
    id: &TaskId,
    artifact: Option<String>,
    output_description: String,
  ) -> bool {
    match self.tasks.get_mut(id) {
      Some(task) => {
        task.artifact = artifact;
        task.output_description = output_description;
        true
      }
      None => false,
    }
  }
}

impl TryFrom<Vec<Task>> for TaskGraph {
  type Error = GraphError;

  fn try_from(tasks: Vec<Task>) -> Result<Self, Self::Error> {
    Self::new(tasks)
  }
}

impl From<TaskGraph> for Vec<Task> {
  fn from(graph: TaskGraph) -> Self {
    graph.tasks.into_values().collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn id(action: &str) -> TaskId {
    TaskId::from_action(action)
  }

  fn chain() -> TaskGraph {
    TaskGraph::new(vec![
      Task::new("A", "Gmail").with_downstream(vec![id("B")]),
      Task::new("B", "Drive").with_downstream(vec![id("C")]),
      Task::new("C", "Discord"),
    ])
    .unwrap()
  }

  #[test]
  fn test_chain_roots_and_terminals() {
    let graph = chain().graph();
    assert_eq!(graph.roots(), &[id("A")]);
    assert_eq!(graph.terminals(), &[id("C")]);
    assert_eq!(graph.predecessors(&id("B")), &[id("A")]);
    assert_eq!(graph.predecessors(&id("C")), &[id("B")]);
    assert!(graph.predecessors(&id("A")).is_empty());
    assert_eq!(graph.topological_order(), vec![id("A"), id("B"), id("C")]);
  }

  #[test]
  fn test_dangling_reference_is_rejected() {
    let ghost = id("Ghost");
    let err = TaskGraph::new(vec![Task::new("A", "Slack").with_downstream(vec![ghost])])
      .unwrap_err();
    assert_eq!(
      err,
      GraphError::DanglingReference {
        task: "A".to_string(),
        reference: ghost.to_string(),
      }
    );
  }

  #[test]
  fn test_duplicate_identity_is_rejected() {
    let err = TaskGraph::new(vec![Task::new("A", "Slack"), Task::new("A", "Discord")])
      .unwrap_err();
    assert!(matches!(err, GraphError::DuplicateTask { .. }));
  }

  #[test]
  fn test_join_point_predecessors_are_sorted() {
    let graph = TaskGraph::new(vec![
      Task::new("Left", "Gmail").with_downstream(vec![id("Join")]),
      Task::new("Right", "Drive").with_downstream(vec![id("Join")]),
      Task::new("Join", "Slack"),
    ])
    .unwrap()
    .graph();

    let mut expected = vec![id("Left"), id("Right")];
    expected.sort();
    assert!(graph.is_join_point(&id("Join")));
    assert_eq!(graph.predecessors(&id("Join")), expected.as_slice());
    assert_eq!(graph.roots(), expected.as_slice());
  }

  #[test]
  fn test_record_output() {
    let mut graph = chain();
    assert!(graph.record_output(&id("B"), Some("code".to_string()), "sends".to_string()));
    let b = graph.find_by_action("B").unwrap();
    assert_eq!(b.artifact.as_deref(), Some("code"));
    assert_eq!(b.output_description, "sends");
    assert!(!graph.record_output(&id("Z"), None, String::new()));
  }

  #[test]
  fn test_serde_revalidates() {
    let graph = chain();
    let json = serde_json::to_string(&graph).unwrap();
    let back: TaskGraph = serde_json::from_str(&json).unwrap();
    assert_eq!(back, graph);

    let dangling = serde_json::to_string(&vec![
      Task::new("A", "Slack").with_downstream(vec![id("Missing")]),
    ])
    .unwrap();
    assert!(serde_json::from_str::<TaskGraph>(&dangling).is_err());
  }
}

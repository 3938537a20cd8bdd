use std::collections::{BTreeMap, BTreeSet};

use crate::task::{Task, TaskId};

/// Graph structure for traversal and analysis.
///
/// All id lists are sorted ascending by [`TaskId`].
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: task -> tasks that consume its output.
  adjacency: BTreeMap<TaskId, Vec<TaskId>>,
  /// Reverse adjacency: task -> tasks that declared it downstream.
  predecessors: BTreeMap<TaskId, Vec<TaskId>>,
  /// Tasks with no incoming edges.
  roots: Vec<TaskId>,
  /// Tasks with an empty downstream list.
  terminals: Vec<TaskId>,
  /// Tasks with multiple incoming edges.
  join_points: BTreeSet<TaskId>,
}

impl Graph {
  /// Build the reverse-dependency index from the tasks' downstream lists.
  pub fn new(tasks: &BTreeMap<TaskId, Task>) -> Self {
    let mut adjacency: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
    let mut predecessors: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();

    for id in tasks.keys() {
      adjacency.entry(*id).or_default();
      predecessors.entry(*id).or_default();
    }

    for task in tasks.values() {
      for to in &task.downstream {
        adjacency.entry(task.id).or_default().push(*to);
        predecessors.entry(*to).or_default().push(task.id);
      }
    }

    for list in adjacency.values_mut().chain(predecessors.values_mut()) {
      list.sort();
      list.dedup();
    }

    let roots = predecessors
      .iter()
      .filter(|(_, incoming)| incoming.is_empty())
      .map(|(id, _)| *id)
      .collect();

    let terminals = tasks
      .values()
      .filter(|task| task.downstream.is_empty())
      .map(|task| task.id)
      .collect();

    let join_points = predecessors
      .iter()
      .filter(|(_, incoming)| incoming.len() > 1)
      .map(|(id, _)| *id)
      .collect();

    Self {
      adjacency,
      predecessors,
      roots,
      terminals,
      join_points,
    }
  }

  /// Tasks with no inbound edge.
  pub fn roots(&self) -> &[TaskId] {
    &self.roots
  }

  /// Tasks with an empty downstream list.
  pub fn terminals(&self) -> &[TaskId] {
    &self.terminals
  }

  /// Tasks consuming the output of `id`.
  pub fn downstream(&self, id: &TaskId) -> &[TaskId] {
    self
      .adjacency
      .get(id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Tasks that declared `id` as a downstream target, ascending by identity.
  pub fn predecessors(&self, id: &TaskId) -> &[TaskId] {
    self
      .predecessors
      .get(id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Check if a task waits on more than one predecessor.
  pub fn is_join_point(&self, id: &TaskId) -> bool {
    self.join_points.contains(id)
  }

  /// Task ids in an order where every task follows all of its predecessors.
  ///
  /// Ties are broken by ascending identity. Tasks on a cycle are omitted.
  pub fn topological_order(&self) -> Vec<TaskId> {
    let mut remaining: BTreeMap<TaskId, usize> = self
      .predecessors
      .iter()
      .map(|(id, incoming)| (*id, incoming.len()))
      .collect();
    let mut ready: BTreeSet<TaskId> = remaining
      .iter()
      .filter(|(_, count)| **count == 0)
      .map(|(id, _)| *id)
      .collect();
    let mut order = Vec::with_capacity(remaining.len());

    while let Some(id) = ready.pop_first() {
      order.push(id);
      for next in self.downstream(&id) {
        if let Some(count) = remaining.get_mut(next) {
          *count -= 1;
          if *count == 0 {
            ready.insert(*next);
          }
        }
      }
    }

    order
  }
}

use std::collections::HashMap;
use std::fmt;

use flowsmith_config::{PlanDef, TaskDef};
use flowsmith_graph::{GraphError, Task, TaskGraph, TaskId};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ResolveError;

/// A downstream reference that did not match any action in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveWarning {
  /// Action of the task declaring the reference.
  pub task: String,
  /// The unmatched action label.
  pub reference: String,
}

impl fmt::Display for ResolveWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "task '{}' references undefined downstream action '{}'",
      self.task, self.reference
    )
  }
}

/// Output of a resolution: the graph plus any dropped references.
#[derive(Debug, Clone)]
pub struct Resolution {
  pub graph: TaskGraph,
  pub warnings: Vec<ResolveWarning>,
}

/// Resolver transforms a raw plan into a validated task graph.
pub trait Resolver: Send + Sync {
  /// Resolve a plan into a task graph.
  ///
  /// This process:
  /// 1. Derives each task's identity from its action label
  /// 2. Resolves downstream action labels to identities
  /// 3. Validates the graph structure (valid edges, no cycles)
  fn resolve(&self, plan: PlanDef) -> Result<Resolution, ResolveError>;
}

/// Standard resolver implementation.
///
/// By default an unresolved downstream label is dropped with a warning. In
/// strict mode it fails resolution with [`GraphError::DanglingReference`].
#[derive(Debug, Clone, Default)]
pub struct StandardResolver {
  strict: bool,
}

impl StandardResolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// A resolver that rejects unresolved downstream labels.
  pub fn strict() -> Self {
    Self { strict: true }
  }

  /// Build the action label -> identity map for the batch.
  fn identity_map(&self, tasks: &[TaskDef]) -> Result<HashMap<String, TaskId>, ResolveError> {
    let mut map = HashMap::with_capacity(tasks.len());
    for (index, task) in tasks.iter().enumerate() {
      if task.action.trim().is_empty() {
        return Err(ResolveError::EmptyAction { index });
      }
      let id = TaskId::from_action(&task.action);
      if map.insert(task.action.clone(), id).is_some() {
        return Err(
          GraphError::DuplicateTask {
            task_id: id.to_string(),
            action: task.action.clone(),
          }
          .into(),
        );
      }
    }
    Ok(map)
  }

  /// Resolve a single descriptor's downstream labels.
  fn resolve_task(
    &self,
    def: TaskDef,
    identities: &HashMap<String, TaskId>,
    warnings: &mut Vec<ResolveWarning>,
  ) -> Result<Task, ResolveError> {
    let mut downstream = Vec::with_capacity(def.downstream.len());
    for label in &def.downstream {
      match identities.get(label) {
        Some(id) => downstream.push(*id),
        None if self.strict => {
          return Err(
            GraphError::DanglingReference {
              task: def.action.clone(),
              reference: label.clone(),
            }
            .into(),
          );
        }
        None => {
          warn!(task = %def.action, reference = %label, "undefined downstream action dropped");
          warnings.push(ResolveWarning {
            task: def.action.clone(),
            reference: label.clone(),
          });
        }
      }
    }

    Ok(Task {
      id: identities[&def.action],
      action: def.action,
      description: def.task_description,
      integration: def.integration,
      parameters: def.parameters,
      downstream,
      output_description: def.output_description,
      artifact: None,
    })
  }

  /// Check for cycles using DFS.
  fn detect_cycle(&self, graph: &TaskGraph) -> Result<(), ResolveError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
      White,
      Gray,
      Black,
    }

    fn dfs(id: TaskId, graph: &TaskGraph, color: &mut HashMap<TaskId, Color>) -> Option<TaskId> {
      color.insert(id, Color::Gray);

      if let Some(task) = graph.get(&id) {
        for next in &task.downstream {
          match color.get(next).copied() {
            Some(Color::Gray) => return Some(*next),
            Some(Color::White) => {
              if let Some(found) = dfs(*next, graph, color) {
                return Some(found);
              }
            }
            _ => {}
          }
        }
      }

      color.insert(id, Color::Black);
      None
    }

    let mut color: HashMap<TaskId, Color> = graph.ids().map(|id| (*id, Color::White)).collect();

    for id in graph.ids() {
      if color.get(id) == Some(&Color::White) {
        if let Some(found) = dfs(*id, graph, &mut color) {
          let task = graph
            .get(&found)
            .map(|t| t.action.clone())
            .unwrap_or_else(|| found.to_string());
          return Err(ResolveError::CycleDetected { task });
        }
      }
    }

    Ok(())
  }
}

impl Resolver for StandardResolver {
  fn resolve(&self, plan: PlanDef) -> Result<Resolution, ResolveError> {
    let identities = self.identity_map(&plan.tasks)?;

    let mut warnings = Vec::new();
    let mut tasks = Vec::with_capacity(plan.tasks.len());
    for def in plan.tasks {
      tasks.push(self.resolve_task(def, &identities, &mut warnings)?);
    }

    let graph = TaskGraph::new(tasks)?;
    self.detect_cycle(&graph)?;

    let adjacency = graph.graph();
    info!(
      tasks = graph.len(),
      roots = adjacency.roots().len(),
      terminals = adjacency.terminals().len(),
      warnings = warnings.len(),
      "plan_resolved"
    );

    Ok(Resolution { graph, warnings })
  }
}

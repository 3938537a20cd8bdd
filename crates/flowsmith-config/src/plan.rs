use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A raw plan as produced by the upstream planner.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanDef {
  /// The user goal the plan was derived from.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub goal: Option<String>,
  pub tasks: Vec<TaskDef>,
}

/// A loosely-structured task descriptor.
///
/// Downstream references are action labels, not identities. They are turned
/// into identities by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  /// Action verb phrase, e.g. "Fetch Source Data".
  pub action: String,
  #[serde(default)]
  pub task_description: String,
  /// Integration service name, e.g. "Slack".
  pub integration: String,
  #[serde(default)]
  pub parameters: BTreeMap<String, serde_json::Value>,
  /// Action labels of the tasks that consume this task's output.
  #[serde(default, alias = "output_nodes")]
  pub downstream: Vec<String>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub output_description: String,
}

impl TaskDef {
  pub fn new(
    action: impl Into<String>,
    integration: impl Into<String>,
    downstream: Vec<String>,
  ) -> Self {
    Self {
      action: action.into(),
      task_description: String::new(),
      integration: integration.into(),
      parameters: BTreeMap::new(),
      downstream,
      output_description: String::new(),
    }
  }
}

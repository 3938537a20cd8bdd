use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Content-addressed task identity.
///
/// The first 16 bytes of SHA-256 over the action label, stamped as a v4 UUID.
/// The same action text always yields the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
  pub fn from_action(action: &str) -> Self {
    let digest = Sha256::digest(action.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
  }

  pub fn as_uuid(&self) -> &Uuid {
    &self.0
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// A unit of integration work targeting one external service action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub id: TaskId,
  pub action: String,
  pub description: String,
  pub integration: String,
  pub parameters: BTreeMap<String, serde_json::Value>,
  /// Identities of the tasks that consume this task's output.
  pub downstream: Vec<TaskId>,
  /// Populated after execution.
  #[serde(default)]
  pub output_description: String,
  /// Populated after execution.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artifact: Option<String>,
}

impl Task {
  /// Create a task whose identity is derived from `action`.
  pub fn new(action: impl Into<String>, integration: impl Into<String>) -> Self {
    let action = action.into();
    Self {
      id: TaskId::from_action(&action),
      action,
      description: String::new(),
      integration: integration.into(),
      parameters: BTreeMap::new(),
      downstream: Vec::new(),
      output_description: String::new(),
      artifact: None,
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.parameters.insert(key.into(), value);
    self
  }

  pub fn with_downstream(mut self, downstream: Vec<TaskId>) -> Self {
    self.downstream = downstream;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_identity_is_deterministic() {
    let a = TaskId::from_action("Fetch Source Data");
    let b = TaskId::from_action("Fetch Source Data");
    assert_eq!(a, b);
    assert_eq!(a.to_string(), b.to_string());
    assert_ne!(a, TaskId::from_action("Notify Channel"));
  }

  #[test]
  fn test_identity_is_v4_uuid() {
    let id = TaskId::from_action("Notify Channel");
    assert_eq!(id.as_uuid().get_version_num(), 4);
    assert_eq!(id.as_uuid().get_variant(), uuid::Variant::RFC4122);
  }

  #[test]
  fn test_identity_is_case_sensitive() {
    assert_ne!(
      TaskId::from_action("notify channel"),
      TaskId::from_action("Notify Channel")
    );
  }

  #[test]
  fn test_task_serializes_id_as_string() {
    let task = Task::new("Post Message", "Discord");
    let value = serde_json::to_value(&task).unwrap();
    assert_eq!(value["id"], serde_json::json!(task.id.to_string()));
    assert!(value.get("artifact").is_none());
  }
}

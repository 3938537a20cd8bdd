use thiserror::Error;

/// Graph validation errors. Raised at construction, before any execution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
  #[error("duplicate task: '{action}' ({task_id})")]
  DuplicateTask { task_id: String, action: String },

  #[error("task '{task}' references unknown downstream task '{reference}'")]
  DanglingReference { task: String, reference: String },
}

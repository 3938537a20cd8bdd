/// Error type for workflow runs.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
  #[error("run cancelled")]
  Cancelled,

  #[error("task join error: {message}")]
  TaskJoin { message: String },

  #[error("task '{task_id}' already published its result")]
  AlreadyPublished { task_id: String },

  #[error("task registry lock poisoned")]
  RegistryPoisoned,

  #[error("no task is ready but {remaining} tasks have not run")]
  Stalled { remaining: usize },
}

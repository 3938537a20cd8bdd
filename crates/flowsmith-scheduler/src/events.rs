//! Run events and notifiers for observability.
//!
//! Events let consumers follow a run's progress (stream to a UI, log, record
//! for tests) without touching the scheduler.

use flowsmith_graph::TaskId;
use flowsmith_pipeline::Completion;
use serde::Serialize;
use tokio::sync::mpsc;

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
  RunStarted {
    run_id: String,
    tasks: usize,
  },

  /// A task's pipeline has started.
  TaskStarted {
    run_id: String,
    task_id: TaskId,
    action: String,
  },

  /// A task has published its result.
  TaskCompleted {
    run_id: String,
    task_id: TaskId,
    completion: Completion,
    iterations: u32,
  },

  RunCompleted {
    run_id: String,
  },

  RunFailed {
    run_id: String,
    error: String,
  },
}

/// Receives run events.
///
/// `notify` is called inline by the scheduler and should not block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: RunEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: RunEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never holds up a run. Volume is two events per task.
  sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: RunEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

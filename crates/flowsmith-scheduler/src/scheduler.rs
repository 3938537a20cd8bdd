use std::collections::BTreeSet;
use std::sync::Arc;

use flowsmith_context::ContextProvider;
use flowsmith_graph::{Graph, TaskGraph, TaskId};
use flowsmith_inference::RotatingClient;
use flowsmith_pipeline::{NodeInput, NodeOutcome, NodePipeline};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::SchedulerError;
use crate::events::{ExecutionNotifier, NoopNotifier, RunEvent};
use crate::registry::TaskRegistry;
use crate::report::RunReport;

type TaskHandle = JoinHandle<Result<NodeOutcome, SchedulerError>>;

/// Run-level settings.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
  /// Upper bound on concurrently running pipelines. `None` runs every ready task at once.
  pub max_concurrency: Option<usize>,
  /// Temperature for generation calls.
  pub generation_temperature: f32,
}

/// Executes a task graph in dependency order.
pub struct Scheduler {
  graph: TaskGraph,
  adjacency: Graph,
  client: RotatingClient,
  context: ContextProvider,
  config: SchedulerConfig,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl Scheduler {
  pub fn new(
    graph: TaskGraph,
    client: RotatingClient,
    context: ContextProvider,
    config: SchedulerConfig,
  ) -> Self {
    let adjacency = graph.graph();
    Self {
      graph,
      adjacency,
      client,
      context,
      config,
      notifier: Arc::new(NoopNotifier),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn graph(&self) -> &TaskGraph {
    &self.graph
  }

  /// Tasks with no predecessors.
  pub fn roots(&self) -> &[TaskId] {
    self.adjacency.roots()
  }

  /// Tasks with no downstream tasks.
  pub fn terminals(&self) -> &[TaskId] {
    self.adjacency.terminals()
  }

  /// Predecessors of a task, ascending by identity.
  pub fn predecessors(&self, id: &TaskId) -> &[TaskId] {
    self.adjacency.predecessors(id)
  }

  /// Run every task once.
  ///
  /// The registry of published results is created here and lives for this
  /// call only. Cancelling aborts the in-flight batch.
  #[instrument(
    name = "scheduler_run",
    skip(self, cancel),
    fields(
      tasks = self.graph.len(),
    )
  )]
  pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport, SchedulerError> {
    let run_id = uuid::Uuid::new_v4().to_string();

    info!(
      run_id = %run_id,
      tasks = self.graph.len(),
      roots = self.roots().len(),
      "run_started"
    );
    self.notifier.notify(RunEvent::RunStarted {
      run_id: run_id.clone(),
      tasks: self.graph.len(),
    });

    let registry = TaskRegistry::new();
    let result = self.run_loop(&registry, &run_id, &cancel).await;

    match &result {
      Ok(()) => {
        info!(run_id = %run_id, "run_completed");
        self.notifier.notify(RunEvent::RunCompleted {
          run_id: run_id.clone(),
        });
      }
      Err(e) => {
        error!(run_id = %run_id, error = %e, "run_failed");
        self.notifier.notify(RunEvent::RunFailed {
          run_id: run_id.clone(),
          error: e.to_string(),
        });
      }
    }
    result?;

    let outcomes = registry.snapshot()?;
    let mut graph = self.graph.clone();
    for outcome in outcomes.values() {
      graph.record_output(
        &outcome.task_id,
        outcome.artifact.clone(),
        outcome.output_description.clone(),
      );
    }

    Ok(RunReport {
      run_id,
      roots: self.roots().to_vec(),
      terminals: self.terminals().to_vec(),
      order: self.adjacency.topological_order(),
      outcomes,
      graph,
    })
  }

  async fn run_loop(
    &self,
    registry: &TaskRegistry,
    run_id: &str,
    cancel: &CancellationToken,
  ) -> Result<(), SchedulerError> {
    let limiter = self
      .config
      .max_concurrency
      .map(|permits| Arc::new(Semaphore::new(permits)));

    loop {
      if cancel.is_cancelled() {
        warn!(run_id = %run_id, "run cancelled");
        return Err(SchedulerError::Cancelled);
      }

      let published = registry.published()?;
      if published.len() == self.graph.len() {
        return Ok(());
      }

      let ready = self.find_ready_tasks(&published);
      if ready.is_empty() {
        return Err(SchedulerError::Stalled {
          remaining: self.graph.len() - published.len(),
        });
      }

      info!(
        run_id = %run_id,
        ready_tasks = ready.len(),
        "executing batch of ready tasks"
      );

      let handles = self.spawn_ready_tasks(&ready, registry, run_id, limiter.as_ref())?;
      let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

      let results = tokio::select! {
        results = futures::future::join_all(handles) => results,
        _ = cancel.cancelled() => {
          warn!(run_id = %run_id, "run cancelled during task execution");
          for abort in aborts {
            abort.abort();
          }
          return Err(SchedulerError::Cancelled);
        }
      };

      // Finished siblings are still reported when one task of the batch failed.
      let mut failure = None;
      for result in results {
        let outcome = match result {
          Ok(Ok(outcome)) => outcome,
          Ok(Err(e)) => {
            error!(run_id = %run_id, error = %e, "task_failed");
            failure.get_or_insert(e);
            continue;
          }
          Err(e) => {
            error!(run_id = %run_id, error = %e, "task_failed");
            failure.get_or_insert(SchedulerError::TaskJoin {
              message: e.to_string(),
            });
            continue;
          }
        };

        info!(
          run_id = %run_id,
          task_id = %outcome.task_id,
          completion = ?outcome.completion,
          iterations = outcome.iterations,
          error = outcome.error,
          "task_completed"
        );
        self.notifier.notify(RunEvent::TaskCompleted {
          run_id: run_id.to_string(),
          task_id: outcome.task_id,
          completion: outcome.completion,
          iterations: outcome.iterations,
        });
      }

      if let Some(e) = failure {
        return Err(e);
      }
    }
  }

  /// Unpublished tasks whose predecessors have all published.
  fn find_ready_tasks(&self, published: &BTreeSet<TaskId>) -> Vec<TaskId> {
    self
      .graph
      .ids()
      .filter(|id| !published.contains(*id))
      .filter(|id| {
        self
          .adjacency
          .predecessors(id)
          .iter()
          .all(|p| published.contains(p))
      })
      .copied()
      .collect()
  }

  fn spawn_ready_tasks(
    &self,
    ready: &[TaskId],
    registry: &TaskRegistry,
    run_id: &str,
    limiter: Option<&Arc<Semaphore>>,
  ) -> Result<Vec<TaskHandle>, SchedulerError> {
    let mut handles = Vec::with_capacity(ready.len());

    for id in ready {
      let Some(task) = self.graph.get(id) else {
        continue;
      };
      let predecessors = registry.outputs_for(self.adjacency.predecessors(id), &self.graph)?;
      let input = NodeInput {
        task: task.clone(),
        predecessors,
      };

      let pipeline = NodePipeline::new(self.client.fork(), self.context.clone())
        .with_temperature(self.config.generation_temperature);
      let registry = registry.clone();
      let notifier = self.notifier.clone();
      let limiter = limiter.cloned();
      let run_id = run_id.to_string();

      handles.push(tokio::spawn(async move {
        let _permit = match limiter {
          Some(limiter) => Some(limiter.acquire_owned().await.map_err(|e| {
            SchedulerError::TaskJoin {
              message: format!("concurrency limiter closed: {}", e),
            }
          })?),
          None => None,
        };

        info!(
          run_id = %run_id,
          task_id = %input.task.id,
          action = %input.task.action,
          predecessors = input.predecessors.len(),
          "task_started"
        );
        notifier.notify(RunEvent::TaskStarted {
          run_id,
          task_id: input.task.id,
          action: input.task.action.clone(),
        });

        let outcome = pipeline.run(&input).await;
        registry.publish(outcome.clone())?;
        Ok(outcome)
      }));
    }

    Ok(handles)
  }
}

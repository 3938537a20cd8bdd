use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flowsmith_config::{PlanDef, TaskDef};
use flowsmith_context::ContextProvider;
use flowsmith_graph::{Task, TaskGraph, TaskId};
use flowsmith_inference::{
  Credential, CredentialPool, InferenceRequest, InferenceService, ProviderError, Purpose,
  RotatingClient,
};
use flowsmith_pipeline::Completion;
use flowsmith_resolver::{Resolver, StandardResolver};
use flowsmith_scheduler::{ChannelNotifier, RunEvent, Scheduler, SchedulerConfig, SchedulerError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Provider double that names artifacts and descriptions after the task's action.
///
/// Successful on the first attempt: confidence 9, every artifact valid.
struct EchoService {
  delay: Option<Duration>,
  panic_on: Option<&'static str>,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
  generations: Mutex<Vec<InferenceRequest>>,
}

impl EchoService {
  fn new() -> Self {
    Self {
      delay: None,
      panic_on: None,
      in_flight: AtomicUsize::new(0),
      max_in_flight: AtomicUsize::new(0),
      generations: Mutex::new(Vec::new()),
    }
  }

  fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// Panic while generating the artifact for `action`.
  fn panicking_on(mut self, action: &'static str) -> Self {
    self.panic_on = Some(action);
    self
  }

  /// System prompt of the generation call for `action`.
  fn generation_prompt(&self, action: &str) -> String {
    self
      .generations
      .lock()
      .unwrap()
      .iter()
      .find(|r| action_of(&r.system) == action)
      .map(|r| r.system.clone())
      .unwrap()
  }
}

fn action_of(system: &str) -> &str {
  let start = system.find("create the ").map(|i| i + "create the ".len());
  let end = system.find(" for the integration");
  match (start, end) {
    (Some(start), Some(end)) if start <= end => &system[start..end],
    _ => "",
  }
}

#[async_trait]
impl InferenceService for EchoService {
  async fn complete(
    &self,
    request: &InferenceRequest,
    _credential: &Credential,
  ) -> Result<String, ProviderError> {
    match request.purpose {
      Purpose::Confidence => Ok("||9||".to_string()),
      Purpose::Generation => {
        if self.panic_on == Some(action_of(&request.system)) {
          panic!("provider client crashed");
        }
        self.generations.lock().unwrap().push(request.clone());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
          tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("code-{}", action_of(&request.system)))
      }
      Purpose::Description => {
        let code = request.messages[0]
          .content
          .trim_start_matches("Here's the generated code:\n")
          .trim();
        Ok(format!("Produces {}.", code))
      }
      Purpose::Validation => Ok("CODE:VALID".to_string()),
      Purpose::Merge => Ok(String::new()),
    }
  }
}

fn client(service: Arc<EchoService>) -> RotatingClient {
  let pool = CredentialPool::from_secrets(["key-0", "key-1"], Duration::from_secs(30)).unwrap();
  RotatingClient::new(service, pool)
}

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

fn scheduler(graph: TaskGraph, service: Arc<EchoService>) -> Scheduler {
  Scheduler::new(
    graph,
    client(service),
    ContextProvider::new(),
    SchedulerConfig::default(),
  )
}

#[tokio::test]
async fn test_chain_passes_descriptions_downstream() {
  let service = Arc::new(EchoService::new());
  let report = scheduler(chain(), service.clone())
    .run(CancellationToken::new())
    .await
    .unwrap();

  assert!(
    service
      .generation_prompt("A")
      .contains("(none)")
  );
  let b = service.generation_prompt("B");
  assert!(b.contains("- A: Produces code-A."));
  let c = service.generation_prompt("C");
  assert!(c.contains("- B: Produces code-B."));
  assert!(!c.contains("- A:"));

  assert_eq!(report.order, vec![id("A"), id("B"), id("C")]);
  assert_eq!(report.roots, vec![id("A")]);
  assert_eq!(report.terminals, vec![id("C")]);
  assert_eq!(report.outcomes.len(), 3);

  let c_outcome = report.outcome(&id("C")).unwrap();
  assert_eq!(c_outcome.completion, Completion::Accepted);
  assert_eq!(c_outcome.upstream_context.len(), 1);
  assert_eq!(c_outcome.upstream_context[0].task_id, id("B"));

  let b_task = report.graph.get(&id("B")).unwrap();
  assert_eq!(b_task.artifact.as_deref(), Some("code-B"));
  assert_eq!(b_task.output_description, "Produces code-B.");
}

#[tokio::test]
async fn test_join_waits_for_all_predecessors() {
  let graph = TaskGraph::new(vec![
    Task::new("Read Inbox", "Gmail").with_downstream(vec![id("Summarize")]),
    Task::new("List Files", "Drive").with_downstream(vec![id("Summarize")]),
    Task::new("Summarize", "OpenAI"),
  ])
  .unwrap();

  let service = Arc::new(EchoService::new());
  let report = scheduler(graph, service.clone())
    .run(CancellationToken::new())
    .await
    .unwrap();

  let join = report.outcome(&id("Summarize")).unwrap();
  let upstream: Vec<TaskId> = join.upstream_context.iter().map(|p| p.task_id).collect();
  let mut expected = vec![id("Read Inbox"), id("List Files")];
  expected.sort();
  assert_eq!(upstream, expected);

  let prompt = service.generation_prompt("Summarize");
  assert!(prompt.contains("- Read Inbox: Produces code-Read Inbox."));
  assert!(prompt.contains("- List Files: Produces code-List Files."));
  assert_eq!(report.order.last(), Some(&id("Summarize")));
}

#[tokio::test]
async fn test_resolved_plan_runs_end_to_end() {
  let plan = PlanDef {
    goal: Some("Forward new rows to the team channel".to_string()),
    tasks: vec![
      TaskDef::new(
        "Fetch Source Data",
        "Sheets",
        vec!["Notify Channel".to_string()],
      ),
      TaskDef::new("Notify Channel", "Discord", Vec::new()),
    ],
  };
  let resolution = StandardResolver::new().resolve(plan).unwrap();
  assert!(resolution.warnings.is_empty());

  let service = Arc::new(EchoService::new());
  let scheduler = scheduler(resolution.graph, service.clone());
  assert_eq!(scheduler.roots(), [id("Fetch Source Data")]);
  assert_eq!(scheduler.terminals(), [id("Notify Channel")]);
  assert_eq!(
    scheduler.predecessors(&id("Notify Channel")),
    [id("Fetch Source Data")]
  );

  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  let notify = report.outcome(&id("Notify Channel")).unwrap();
  assert_eq!(
    notify.upstream_context[0].output_description,
    "Produces code-Fetch Source Data."
  );
  assert!(
    service
      .generation_prompt("Notify Channel")
      .contains("Produces code-Fetch Source Data.")
  );
  assert_eq!(report.merge_inputs().len(), 2);
  assert_eq!(report.merge_inputs()[0].action, "Fetch Source Data");
}

#[tokio::test]
async fn test_events_follow_dependency_order() {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let service = Arc::new(EchoService::new());
  let report = scheduler(chain(), service)
    .with_notifier(Arc::new(ChannelNotifier::new(tx)))
    .run(CancellationToken::new())
    .await
    .unwrap();

  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }

  assert_eq!(
    events.first(),
    Some(&RunEvent::RunStarted {
      run_id: report.run_id.clone(),
      tasks: 3,
    })
  );
  assert_eq!(
    events.last(),
    Some(&RunEvent::RunCompleted {
      run_id: report.run_id.clone(),
    })
  );

  let task_events: Vec<(bool, TaskId)> = events
    .iter()
    .filter_map(|e| match e {
      RunEvent::TaskStarted { task_id, .. } => Some((true, *task_id)),
      RunEvent::TaskCompleted { task_id, .. } => Some((false, *task_id)),
      _ => None,
    })
    .collect();
  assert_eq!(
    task_events,
    vec![
      (true, id("A")),
      (false, id("A")),
      (true, id("B")),
      (false, id("B")),
      (true, id("C")),
      (false, id("C")),
    ]
  );
}

#[tokio::test]
async fn test_cancelled_before_start() {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let cancel = CancellationToken::new();
  cancel.cancel();

  let service = Arc::new(EchoService::new());
  let err = scheduler(chain(), service.clone())
    .with_notifier(Arc::new(ChannelNotifier::new(tx)))
    .run(cancel)
    .await
    .unwrap_err();

  assert!(matches!(err, SchedulerError::Cancelled));
  assert!(service.generations.lock().unwrap().is_empty());

  let mut last = None;
  while let Ok(event) = rx.try_recv() {
    last = Some(event);
  }
  assert!(matches!(last, Some(RunEvent::RunFailed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_during_batch() {
  let service = Arc::new(EchoService::new().with_delay(Duration::from_secs(3600)));
  let cancel = CancellationToken::new();

  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_secs(1)).await;
    trigger.cancel();
  });

  let err = scheduler(chain(), service.clone())
    .run(cancel)
    .await
    .unwrap_err();

  assert!(matches!(err, SchedulerError::Cancelled));
  assert_eq!(service.generations.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_limit() {
  let graph = TaskGraph::new(vec![
    Task::new("Read Inbox", "Gmail"),
    Task::new("List Files", "Drive"),
    Task::new("List Events", "Calendar"),
  ])
  .unwrap();

  let service = Arc::new(EchoService::new().with_delay(Duration::from_secs(1)));
  let report = Scheduler::new(
    graph,
    client(service.clone()),
    ContextProvider::new(),
    SchedulerConfig {
      max_concurrency: Some(1),
      generation_temperature: 0.0,
    },
  )
  .run(CancellationToken::new())
  .await
  .unwrap();

  assert_eq!(report.outcomes.len(), 3);
  assert_eq!(service.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_independent_tasks_run_concurrently() {
  let graph = TaskGraph::new(vec![
    Task::new("Read Inbox", "Gmail"),
    Task::new("List Files", "Drive"),
    Task::new("List Events", "Calendar"),
  ])
  .unwrap();

  let service = Arc::new(EchoService::new().with_delay(Duration::from_secs(1)));
  scheduler(graph, service.clone())
    .run(CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(service.max_in_flight.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_empty_graph_completes() {
  let service = Arc::new(EchoService::new());
  let report = scheduler(TaskGraph::new(Vec::new()).unwrap(), service)
    .run(CancellationToken::new())
    .await
    .unwrap();
  assert!(report.outcomes.is_empty());
  assert!(report.order.is_empty());
}

#[tokio::test]
async fn test_cyclic_graph_stalls_without_running() {
  let graph = TaskGraph::new(vec![
    Task::new("A", "Gmail").with_downstream(vec![id("B")]),
    Task::new("B", "Drive").with_downstream(vec![id("A")]),
  ])
  .unwrap();

  let service = Arc::new(EchoService::new());
  let err = scheduler(graph, service.clone())
    .run(CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(err, SchedulerError::Stalled { remaining: 2 }));
  assert!(service.generations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_panicked_task_still_reports_finished_siblings() {
  let graph = TaskGraph::new(vec![
    Task::new("Read Inbox", "Gmail").with_downstream(vec![id("Summarize")]),
    Task::new("List Files", "Drive").with_downstream(vec![id("Summarize")]),
    Task::new("Summarize", "OpenAI"),
  ])
  .unwrap();

  let (tx, mut rx) = mpsc::unbounded_channel();
  let service = Arc::new(EchoService::new().panicking_on("Read Inbox"));
  let err = scheduler(graph, service.clone())
    .with_notifier(Arc::new(ChannelNotifier::new(tx)))
    .run(CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(err, SchedulerError::TaskJoin { .. }));

  let mut completed = Vec::new();
  while let Ok(event) = rx.try_recv() {
    if let RunEvent::TaskCompleted { task_id, .. } = event {
      completed.push(task_id);
    }
  }
  assert_eq!(completed, vec![id("List Files")]);
  assert!(
    service
      .generations
      .lock()
      .unwrap()
      .iter()
      .all(|r| action_of(&r.system) != "Summarize")
  );
}

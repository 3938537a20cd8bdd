use flowsmith_context::{ContextOrigin, ContextProvider, ContextQuery, SearchScope};
use flowsmith_graph::{Task, TaskId};
use flowsmith_inference::{InferenceRequest, Message, Purpose, RotatingClient};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::parse::{self, Verdict};
use crate::prompts::{GenerationVars, Prompts, SourceVar};
use crate::state::{Completion, NodeExecutionState, NodeState, Stage, TranscriptEntry};

/// Confidence and validation calls run deterministic.
const SCORING_TEMPERATURE: f32 = 0.0;

/// Sentences allowed in an output description.
const DESCRIPTION_SENTENCES: usize = 2;

/// The published result of a completed predecessor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredecessorOutput {
  pub task_id: TaskId,
  pub action: String,
  pub output_description: String,
}

/// Everything a pipeline run needs: the task and its predecessors' outputs.
#[derive(Debug, Clone)]
pub struct NodeInput {
  pub task: Task,
  /// Ascending by task identity.
  pub predecessors: Vec<PredecessorOutput>,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
  pub task_id: TaskId,
  pub artifact: Option<String>,
  pub output_description: String,
  pub completion: Completion,
  pub iterations: u32,
  /// Still set when the run was exhausted on an invalid artifact.
  pub error: bool,
  pub confidence: u8,
  pub scope: SearchScope,
  pub context_origin: ContextOrigin,
  /// Predecessor outputs the run was given.
  pub upstream_context: Vec<PredecessorOutput>,
  pub transcript: Vec<TranscriptEntry>,
}

/// Generate/validate state machine for a single task.
pub struct NodePipeline {
  client: RotatingClient,
  context: ContextProvider,
  prompts: Prompts,
  temperature: f32,
}

impl NodePipeline {
  pub fn new(client: RotatingClient, context: ContextProvider) -> Self {
    Self {
      client,
      context,
      prompts: Prompts::new(),
      temperature: 0.0,
    }
  }

  /// Temperature for generation and description calls.
  pub fn with_temperature(mut self, temperature: f32) -> Self {
    self.temperature = temperature;
    self
  }

  /// Drive the task to `Done`. Never fails.
  #[instrument(
    name = "node_pipeline",
    skip(self, input),
    fields(
      task_id = %input.task.id,
      action = %input.task.action,
    )
  )]
  pub async fn run(&self, input: &NodeInput) -> NodeOutcome {
    let task = &input.task;
    let parameters = render_parameters(task);
    let mut exec = NodeExecutionState::new(&task.action, self.temperature);
    let mut state = NodeState::AssessConfidence;

    let completion = loop {
      match state {
        NodeState::AssessConfidence => self.assess_confidence(task, &parameters, &mut exec).await,
        NodeState::RetrieveContext => self.retrieve_context(task, &parameters, &mut exec).await,
        NodeState::Generate => self.generate(input, &parameters, &mut exec).await,
        NodeState::Validate => self.validate(task, &parameters, &mut exec).await,
        NodeState::Done(completion) => break completion,
      }

      let next = state.next(&exec);
      debug!(
        from = ?state,
        to = ?next,
        iterations = exec.iterations,
        error = exec.error,
        "node_state_transition"
      );
      state = next;
    };

    info!(
      completion = ?completion,
      iterations = exec.iterations,
      confidence = exec.confidence,
      "node_pipeline_finished"
    );

    let (scope, context_origin) = match &exec.context {
      Some(ctx) => (ctx.scope, ctx.origin),
      None => (
        SearchScope::from_confidence(exec.confidence),
        ContextOrigin::None,
      ),
    };

    NodeOutcome {
      task_id: task.id,
      artifact: exec.artifact,
      output_description: exec.output_description,
      completion,
      iterations: exec.iterations,
      error: exec.error,
      confidence: exec.confidence,
      scope,
      context_origin,
      upstream_context: input.predecessors.clone(),
      transcript: exec.transcript,
    }
  }

  async fn assess_confidence(&self, task: &Task, parameters: &str, exec: &mut NodeExecutionState) {
    let response = match self
      .prompts
      .confidence(&task.action, &task.integration, parameters)
    {
      Ok(system) => {
        let request = InferenceRequest::new(Purpose::Confidence, system, SCORING_TEMPERATURE)
          .with_messages(exec.conversation());
        self.client.complete(&request).await.map_err(|e| e.to_string())
      }
      Err(e) => Err(e.to_string()),
    };

    match response {
      Ok(text) => {
        exec.confidence = parse::parse_confidence(&text);
        exec.record(
          Stage::Confidence,
          Message::assistant(format!("Confidence: {}", exec.confidence)),
        );
      }
      Err(e) => {
        warn!(error = %e, "confidence assessment failed");
        exec.confidence = parse::DEFAULT_CONFIDENCE;
        exec.record(
          Stage::Confidence,
          Message::assistant(format!(
            "Confidence assessment failed ({}), using {}",
            e,
            exec.confidence
          )),
        );
      }
    }
  }

  async fn retrieve_context(&self, task: &Task, parameters: &str, exec: &mut NodeExecutionState) {
    let scope = SearchScope::from_confidence(exec.confidence);
    let query = ContextQuery {
      integration: task.integration.clone(),
      action: task.action.clone(),
      description: task.description.clone(),
      parameters: parameters.to_string(),
    };

    let ctx = self.context.retrieve(&query, scope).await;
    let chars = ctx.text.chars().count();
    let note = match ctx.origin {
      ContextOrigin::None => format!("{} (no external context)", scope.label()),
      ContextOrigin::Local => format!("{} local documents, {} chars", scope.label(), chars),
      ContextOrigin::Search => format!("{} web search, {} chars", scope.label(), chars),
    };
    exec.record(Stage::Retrieval, Message::assistant(note));
    exec.context = Some(ctx);
  }

  async fn generate(&self, input: &NodeInput, parameters: &str, exec: &mut NodeExecutionState) {
    let task = &input.task;
    if exec.error {
      exec.record(Stage::Generation, Message::user(self.prompts.retry()));
    }

    let context_text = exec
      .context
      .as_ref()
      .map(|c| c.prompt_section())
      .unwrap_or_default();

    match self.generate_artifact(input, parameters, &context_text, exec).await {
      Ok(code) => {
        let description = self.describe(&code, parameters, &context_text).await;
        exec.record(
          Stage::Generation,
          Message::assistant(format!("Generated Code: {}\n", code)),
        );
        exec.record(
          Stage::Generation,
          Message::assistant(format!("Output Description:\n{}", description)),
        );
        exec.artifact = Some(code);
        exec.output_description = description;
        exec.error = false;
      }
      Err(e) => {
        warn!(task_id = %task.id, error = %e, "generation failed");
        exec.record(
          Stage::Generation,
          Message::assistant(format!("Failed to generate code: {}", e)),
        );
        exec.error = true;
      }
    }
    exec.iterations += 1;
  }

  async fn generate_artifact(
    &self,
    input: &NodeInput,
    parameters: &str,
    context_text: &str,
    exec: &NodeExecutionState,
  ) -> Result<String, String> {
    let task = &input.task;
    let system = self
      .prompts
      .generation(GenerationVars {
        name: &task.integration,
        action: &task.action,
        parameters,
        context: context_text,
        sources: input
          .predecessors
          .iter()
          .map(|p| SourceVar {
            action: &p.action,
            description: &p.output_description,
          })
          .collect(),
        task_description: &task.description,
      })
      .map_err(|e| e.to_string())?;
    let placeholders = self
      .prompts
      .placeholders(&task.integration)
      .map_err(|e| e.to_string())?;

    let request = InferenceRequest::new(Purpose::Generation, system, exec.temperature)
      .with_messages(exec.conversation())
      .with_message(Message::user(placeholders));

    let response = self.client.complete(&request).await.map_err(|e| e.to_string())?;
    let code = parse::extract_code(&response);
    if code.is_empty() {
      return Err("empty response".to_string());
    }
    Ok(code)
  }

  /// Plain-text summary for dependents. Empty when the call fails.
  async fn describe(&self, code: &str, parameters: &str, context_text: &str) -> String {
    let system = match self.prompts.description(context_text, parameters) {
      Ok(system) => system,
      Err(e) => {
        warn!(error = %e, "description prompt failed");
        return String::new();
      }
    };

    let request = InferenceRequest::new(Purpose::Description, system, self.temperature)
      .with_message(Message::user(format!("Here's the generated code:\n{}\n", code)));

    match self.client.complete(&request).await {
      Ok(text) => parse::limit_sentences(&text, DESCRIPTION_SENTENCES),
      Err(e) => {
        warn!(error = %e, "description generation failed");
        String::new()
      }
    }
  }

  async fn validate(&self, task: &Task, parameters: &str, exec: &mut NodeExecutionState) {
    let Some(code) = exec.artifact.clone() else {
      exec.record(
        Stage::Validation,
        Message::assistant("Validation skipped: no artifact to check"),
      );
      return;
    };

    let response = match self
      .prompts
      .validation(&task.action, &task.integration, parameters)
    {
      Ok(system) => {
        let request = InferenceRequest::new(Purpose::Validation, system, SCORING_TEMPERATURE)
          .with_messages(exec.conversation())
          .with_message(Message::user(format!("Code: {}", code)));
        self.client.complete(&request).await.map_err(|e| e.to_string())
      }
      Err(e) => Err(e.to_string()),
    };

    match response.map(|text| Verdict::from_response(&text)) {
      Ok(Verdict::Valid) => {
        exec.record(Stage::Validation, Message::assistant("CODE:VALID"));
        exec.error = false;
      }
      Ok(Verdict::Invalid { critique }) => {
        exec.record(
          Stage::Validation,
          Message::user(format!("Validation issues found: {}", critique)),
        );
        exec.error = true;
      }
      Err(e) => {
        warn!(error = %e, "validation call failed, accepting artifact");
        exec.record(
          Stage::Validation,
          Message::assistant(format!("Validation unavailable ({}), accepting artifact", e)),
        );
        exec.error = false;
      }
    }
  }
}

fn render_parameters(task: &Task) -> String {
  serde_json::to_string_pretty(&task.parameters).unwrap_or_else(|_| "{}".to_string())
}

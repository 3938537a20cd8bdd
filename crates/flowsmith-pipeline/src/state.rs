use flowsmith_context::RetrievedContext;
use flowsmith_inference::Message;
use serde::Serialize;

/// Generation attempts before the last artifact is accepted as-is.
pub const MAX_ITERATIONS: u32 = 3;

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
  /// Validation reported no error.
  Accepted,
  /// The iteration bound was reached with the error flag still set.
  Exhausted,
}

/// Position in the per-task state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
  AssessConfidence,
  RetrieveContext,
  Generate,
  Validate,
  Done(Completion),
}

impl NodeState {
  /// Transition function. Only `Validate` branches.
  pub fn next(self, exec: &NodeExecutionState) -> NodeState {
    match self {
      NodeState::AssessConfidence => NodeState::RetrieveContext,
      NodeState::RetrieveContext => NodeState::Generate,
      NodeState::Generate => NodeState::Validate,
      NodeState::Validate if !exec.error => NodeState::Done(Completion::Accepted),
      NodeState::Validate if exec.iterations >= MAX_ITERATIONS => {
        NodeState::Done(Completion::Exhausted)
      }
      NodeState::Validate => NodeState::Generate,
      NodeState::Done(completion) => NodeState::Done(completion),
    }
  }

  pub fn is_done(&self) -> bool {
    matches!(self, NodeState::Done(_))
  }
}

/// Which step produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Request,
  Confidence,
  Retrieval,
  Generation,
  Validation,
}

impl Stage {
  /// Whether entries of this stage are replayed to the provider as conversation.
  fn is_dialogue(&self) -> bool {
    matches!(self, Stage::Request | Stage::Generation | Stage::Validation)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
  pub stage: Stage,
  #[serde(flatten)]
  pub message: Message,
}

/// Ephemeral state of one pipeline run.
#[derive(Debug, Clone)]
pub struct NodeExecutionState {
  pub transcript: Vec<TranscriptEntry>,
  pub iterations: u32,
  pub error: bool,
  pub confidence: u8,
  pub temperature: f32,
  pub context: Option<RetrievedContext>,
  pub artifact: Option<String>,
  pub output_description: String,
}

impl NodeExecutionState {
  pub fn new(action: &str, temperature: f32) -> Self {
    Self {
      transcript: vec![TranscriptEntry {
        stage: Stage::Request,
        message: Message::user(format!("Action: {}", action)),
      }],
      iterations: 0,
      error: false,
      confidence: crate::parse::DEFAULT_CONFIDENCE,
      temperature,
      context: None,
      artifact: None,
      output_description: String::new(),
    }
  }

  pub fn record(&mut self, stage: Stage, message: Message) {
    self.transcript.push(TranscriptEntry { stage, message });
  }

  /// Transcript entries that form the conversation with the provider.
  pub fn conversation(&self) -> Vec<Message> {
    self
      .transcript
      .iter()
      .filter(|e| e.stage.is_dialogue())
      .map(|e| e.message.clone())
      .collect()
  }
}

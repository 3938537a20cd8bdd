use flowsmith_inference::{InferenceRequest, Message, ProviderError, Purpose, RotatingClient};
use serde::Serialize;
use tracing::info;

use crate::parse;
use crate::prompts::{PromptError, Prompts};

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
  #[error("no artifacts to merge")]
  NothingToMerge,

  #[error(transparent)]
  Prompt(#[from] PromptError),

  #[error(transparent)]
  Provider(#[from] ProviderError),
}

/// One task's artifact, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct MergeInput {
  pub action: String,
  pub integration: String,
  pub artifact: String,
}

/// Combines per-task artifacts into one program.
pub struct Merger {
  client: RotatingClient,
  prompts: Prompts,
  temperature: f32,
}

impl Merger {
  pub fn new(client: RotatingClient) -> Self {
    Self {
      client,
      prompts: Prompts::new(),
      temperature: 0.0,
    }
  }

  pub fn with_temperature(mut self, temperature: f32) -> Self {
    self.temperature = temperature;
    self
  }

  pub async fn merge(&self, goal: &str, snippets: &[MergeInput]) -> Result<String, MergeError> {
    if snippets.is_empty() {
      return Err(MergeError::NothingToMerge);
    }

    let system = self.prompts.merge(snippets)?;
    let request = InferenceRequest::new(Purpose::Merge, system, self.temperature)
      .with_message(Message::user(format!("Original request: {}", goal)));

    let response = self.client.complete(&request).await?;
    info!(snippets = snippets.len(), "artifacts_merged");
    Ok(parse::extract_code(&response))
  }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{InferenceRequest, Role};
use crate::service::{Credential, InferenceService};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions provider.
pub struct OpenAiProvider {
  client: Client,
  base_url: String,
  model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
  temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'static str,
  content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
  message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
  #[serde(default)]
  content: Option<String>,
}

impl OpenAiProvider {
  pub fn new(
    model: impl Into<String>,
    base_url: Option<String>,
    timeout: Duration,
  ) -> Result<Self, ProviderError> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ProviderError::Fatal {
        message: format!("failed to create HTTP client: {}", e),
      })?;

    Ok(Self {
      client,
      base_url: base_url
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string(),
      model: model.into(),
    })
  }
}

#[async_trait]
impl InferenceService for OpenAiProvider {
  async fn complete(
    &self,
    request: &InferenceRequest,
    credential: &Credential,
  ) -> Result<String, ProviderError> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(ChatMessage {
      role: "system",
      content: &request.system,
    });
    for message in &request.messages {
      messages.push(ChatMessage {
        role: match message.role {
          Role::User => "user",
          Role::Assistant => "assistant",
        },
        content: &message.content,
      });
    }

    let body = ChatRequest {
      model: &self.model,
      messages,
      temperature: request.temperature,
    };

    let response = self
      .client
      .post(format!("{}/chat/completions", self.base_url))
      .bearer_auth(credential.secret())
      .json(&body)
      .send()
      .await
      .map_err(|e| ProviderError::from_message(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      return Err(classify_status(status, text));
    }

    let parsed: ChatResponse = response.json().await.map_err(|e| ProviderError::Fatal {
      message: format!("invalid chat completion response: {}", e),
    })?;

    Ok(
      parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default(),
    )
  }
}

/// Map a non-success HTTP status to a provider error.
pub(crate) fn classify_status(status: StatusCode, body: String) -> ProviderError {
  let message = format!("HTTP {}: {}", status.as_u16(), body);
  if status == StatusCode::TOO_MANY_REQUESTS {
    ProviderError::RateLimited { message }
  } else {
    ProviderError::from_message(message)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_classification() {
    assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_rate_limited());
    assert!(
      classify_status(
        StatusCode::FORBIDDEN,
        "You exceeded your current quota".to_string()
      )
      .is_rate_limited()
    );
    assert!(!classify_status(StatusCode::UNAUTHORIZED, "bad key".to_string()).is_rate_limited());
  }
}

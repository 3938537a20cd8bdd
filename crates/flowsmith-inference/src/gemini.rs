use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{InferenceRequest, Role};
use crate::openai::classify_status;
use crate::service::{Credential, InferenceService};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
  client: Client,
  base_url: String,
  model: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
  system_instruction: Content<'a>,
  contents: Vec<Content<'a>>,
  generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<&'static str>,
  parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
  text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
  temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  #[serde(default)]
  content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
  #[serde(default)]
  text: String,
}

impl GeminiProvider {
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
impl InferenceService for GeminiProvider {
  async fn complete(
    &self,
    request: &InferenceRequest,
    credential: &Credential,
  ) -> Result<String, ProviderError> {
    let mut contents: Vec<Content<'_>> = request
      .messages
      .iter()
      .map(|m| Content {
        role: Some(match m.role {
          Role::User => "user",
          Role::Assistant => "model",
        }),
        parts: vec![Part { text: &m.content }],
      })
      .collect();

    // generateContent rejects an empty conversation
    if contents.is_empty() {
      contents.push(Content {
        role: Some("user"),
        parts: vec![Part { text: "Respond." }],
      });
    }

    let body = GenerateRequest {
      system_instruction: Content {
        role: None,
        parts: vec![Part {
          text: &request.system,
        }],
      },
      contents,
      generation_config: GenerationConfig {
        temperature: request.temperature,
      },
    };

    let response = self
      .client
      .post(format!(
        "{}/models/{}:generateContent",
        self.base_url, self.model
      ))
      .header("x-goog-api-key", credential.secret())
      .json(&body)
      .send()
      .await
      .map_err(|e| ProviderError::from_message(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      return Err(classify_status(status, text));
    }

    let parsed: GenerateResponse = response.json().await.map_err(|e| ProviderError::Fatal {
      message: format!("invalid generateContent response: {}", e),
    })?;

    Ok(
      parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| {
          c.parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("")
        })
        .unwrap_or_default(),
    )
  }
}

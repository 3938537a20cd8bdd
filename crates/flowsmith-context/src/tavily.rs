use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ContextError;
use crate::source::{SearchProvider, Snippet};

const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

/// Tavily web search client.
pub struct TavilySearch {
  client: Client,
  endpoint: String,
  api_key: String,
  max_results: usize,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
  api_key: &'a str,
  query: &'a str,
  max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
  #[serde(default)]
  results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
  #[serde(default)]
  title: Option<String>,
  #[serde(default)]
  url: Option<String>,
  #[serde(default)]
  content: String,
}

impl TavilySearch {
  pub fn new(
    api_key: impl Into<String>,
    max_results: usize,
    timeout: Duration,
  ) -> Result<Self, ContextError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      endpoint: DEFAULT_ENDPOINT.to_string(),
      api_key: api_key.into(),
      max_results,
    })
  }

  /// Point the client at a different endpoint (self-hosted proxies, tests).
  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into();
    self
  }
}

#[async_trait]
impl SearchProvider for TavilySearch {
  async fn search(&self, query: &str) -> Result<Vec<Snippet>, ContextError> {
    let body = SearchRequest {
      api_key: &self.api_key,
      query,
      max_results: self.max_results,
    };

    let response = self.client.post(&self.endpoint).json(&body).send().await?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      return Err(ContextError::InvalidResponse {
        message: format!("HTTP {}: {}", status.as_u16(), text),
      });
    }

    let parsed: SearchResponse =
      response
        .json()
        .await
        .map_err(|e| ContextError::InvalidResponse {
          message: e.to_string(),
        })?;

    Ok(
      parsed
        .results
        .into_iter()
        .filter(|r| !r.content.trim().is_empty())
        .map(|r| Snippet {
          title: r.title,
          url: r.url,
          content: r.content,
        })
        .collect(),
    )
  }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  pub content: String,
}

impl Snippet {
  pub fn new(content: impl Into<String>) -> Self {
    Self {
      title: None,
      url: None,
      content: content.into(),
    }
  }
}

/// Local documentation lookup, keyed by integration name.
#[async_trait]
pub trait DocumentStore: Send + Sync {
  /// Return the integration's document, or `None` if there is none.
  async fn lookup(&self, integration: &str) -> Result<Option<String>, ContextError>;
}

/// Networked search returning ranked snippets.
#[async_trait]
pub trait SearchProvider: Send + Sync {
  async fn search(&self, query: &str) -> Result<Vec<Snippet>, ContextError>;
}

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::source::{DocumentStore, SearchProvider, Snippet};

/// Character ceiling for broad search results.
pub const BROAD_LIMIT: usize = 1000;
/// Character ceiling for narrow search results.
pub const NARROW_LIMIT: usize = 500;

/// How much external lookup a task gets, chosen from its confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
  /// Confidence 0-4: wide documentation search.
  Broad,
  /// Confidence 5-6: search scoped by the task's parameters.
  Narrow,
  /// Confidence 7-10: no lookup.
  Internal,
}

impl SearchScope {
  pub fn from_confidence(score: u8) -> Self {
    match score {
      0..=4 => SearchScope::Broad,
      5..=6 => SearchScope::Narrow,
      _ => SearchScope::Internal,
    }
  }

  /// Maximum number of characters attached to the prompt.
  pub fn limit(&self) -> Option<usize> {
    match self {
      SearchScope::Broad => Some(BROAD_LIMIT),
      SearchScope::Narrow => Some(NARROW_LIMIT),
      SearchScope::Internal => None,
    }
  }

  /// Heading placed in front of the context in the generation prompt.
  pub fn label(&self) -> &'static str {
    match self {
      SearchScope::Broad => "Use ONLY THESE Web results:",
      SearchScope::Narrow => "Supplemental context:",
      SearchScope::Internal => "Using internal knowledge base",
    }
  }
}

/// What a lookup is about.
#[derive(Debug, Clone, Default)]
pub struct ContextQuery {
  pub integration: String,
  pub action: String,
  pub description: String,
  /// Parameters rendered as text, used by narrow searches.
  pub parameters: String,
}

impl ContextQuery {
  /// Web search query for the given scope. `None` for [`SearchScope::Internal`].
  pub fn search_text(&self, scope: SearchScope) -> Option<String> {
    match scope {
      SearchScope::Broad => Some(format!(
        "{} API {} documentation - {}",
        self.integration, self.action, self.description
      )),
      SearchScope::Narrow => Some(format!(
        "{} API {} {} - {}",
        self.integration, self.action, self.parameters, self.description
      )),
      SearchScope::Internal => None,
    }
  }
}

/// Where retrieved text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextOrigin {
  Local,
  Search,
  None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedContext {
  pub scope: SearchScope,
  pub origin: ContextOrigin,
  /// Retrieved text, already truncated to the scope's limit.
  pub text: String,
}

impl RetrievedContext {
  fn empty(scope: SearchScope) -> Self {
    Self {
      scope,
      origin: ContextOrigin::None,
      text: String::new(),
    }
  }

  /// Labelled block for the generation prompt.
  pub fn prompt_section(&self) -> String {
    if self.text.is_empty() {
      self.scope.label().to_string()
    } else {
      format!("{}\n{}", self.scope.label(), self.text)
    }
  }
}

/// Tiered context retrieval over optional local and search backends.
///
/// Retrieval never fails. Backend errors are logged and yield empty context.
#[derive(Clone, Default)]
pub struct ContextProvider {
  documents: Option<Arc<dyn DocumentStore>>,
  search: Option<Arc<dyn SearchProvider>>,
}

impl ContextProvider {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_documents(mut self, documents: Arc<dyn DocumentStore>) -> Self {
    self.documents = Some(documents);
    self
  }

  pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
    self.search = Some(search);
    self
  }

  pub async fn retrieve(&self, query: &ContextQuery, scope: SearchScope) -> RetrievedContext {
    let Some(search_text) = query.search_text(scope) else {
      return RetrievedContext::empty(scope);
    };

    if let Some(documents) = &self.documents {
      match documents.lookup(&query.integration).await {
        Ok(Some(doc)) => {
          debug!(integration = %query.integration, "local_documents_found");
          return RetrievedContext {
            scope,
            origin: ContextOrigin::Local,
            text: truncate(&doc, scope.limit()),
          };
        }
        Ok(None) => {}
        Err(e) => warn!(integration = %query.integration, error = %e, "local_documents_failed"),
      }
    }

    let Some(search) = &self.search else {
      return RetrievedContext::empty(scope);
    };

    match search.search(&search_text).await {
      Ok(snippets) if !snippets.is_empty() => RetrievedContext {
        scope,
        origin: ContextOrigin::Search,
        text: truncate(&join_snippets(&snippets), scope.limit()),
      },
      Ok(_) => RetrievedContext::empty(scope),
      Err(e) => {
        warn!(query = %search_text, error = %e, "search_failed");
        RetrievedContext::empty(scope)
      }
    }
  }
}

fn join_snippets(snippets: &[Snippet]) -> String {
  snippets
    .iter()
    .map(|s| s.content.trim())
    .collect::<Vec<_>>()
    .join("\n")
}

/// Truncate on a character boundary.
fn truncate(text: &str, limit: Option<usize>) -> String {
  match limit {
    Some(limit) => text.chars().take(limit).collect(),
    None => text.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;

  use super::*;
  use crate::error::ContextError;

  struct RecordingSearch {
    queries: Mutex<Vec<String>>,
    snippet: String,
  }

  impl RecordingSearch {
    fn new(snippet: impl Into<String>) -> Self {
      Self {
        queries: Mutex::new(Vec::new()),
        snippet: snippet.into(),
      }
    }
  }

  #[async_trait]
  impl SearchProvider for RecordingSearch {
    async fn search(&self, query: &str) -> Result<Vec<Snippet>, ContextError> {
      self.queries.lock().unwrap().push(query.to_string());
      Ok(vec![Snippet::new(self.snippet.clone())])
    }
  }

  struct FailingSearch;

  #[async_trait]
  impl SearchProvider for FailingSearch {
    async fn search(&self, _query: &str) -> Result<Vec<Snippet>, ContextError> {
      Err(ContextError::InvalidResponse {
        message: "HTTP 500".to_string(),
      })
    }
  }

  struct StaticDocs(Option<String>);

  #[async_trait]
  impl DocumentStore for StaticDocs {
    async fn lookup(&self, _integration: &str) -> Result<Option<String>, ContextError> {
      Ok(self.0.clone())
    }
  }

  fn query() -> ContextQuery {
    ContextQuery {
      integration: "Slack".to_string(),
      action: "Post Message".to_string(),
      description: "Send a message to a channel".to_string(),
      parameters: r#"{"channel":"general"}"#.to_string(),
    }
  }

  #[test]
  fn test_scope_from_confidence() {
    assert_eq!(SearchScope::from_confidence(0), SearchScope::Broad);
    assert_eq!(SearchScope::from_confidence(4), SearchScope::Broad);
    assert_eq!(SearchScope::from_confidence(5), SearchScope::Narrow);
    assert_eq!(SearchScope::from_confidence(6), SearchScope::Narrow);
    assert_eq!(SearchScope::from_confidence(7), SearchScope::Internal);
    assert_eq!(SearchScope::from_confidence(10), SearchScope::Internal);
  }

  #[test]
  fn test_truncate_counts_chars() {
    assert_eq!(truncate("héllo", Some(2)), "hé");
    assert_eq!(truncate("abc", None), "abc");
  }

  #[tokio::test]
  async fn test_broad_search_is_truncated() {
    let search = Arc::new(RecordingSearch::new("x".repeat(5000)));
    let provider = ContextProvider::new().with_search(search.clone());

    let ctx = provider.retrieve(&query(), SearchScope::Broad).await;
    assert_eq!(ctx.origin, ContextOrigin::Search);
    assert_eq!(ctx.text.chars().count(), BROAD_LIMIT);

    let queries = search.queries.lock().unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(
      queries[0],
      "Slack API Post Message documentation - Send a message to a channel"
    );
  }

  #[tokio::test]
  async fn test_narrow_search_includes_parameters() {
    let search = Arc::new(RecordingSearch::new("y".repeat(800)));
    let provider = ContextProvider::new().with_search(search.clone());

    let ctx = provider.retrieve(&query(), SearchScope::Narrow).await;
    assert_eq!(ctx.text.chars().count(), NARROW_LIMIT);
    assert!(search.queries.lock().unwrap()[0].contains(r#"{"channel":"general"}"#));
  }

  #[tokio::test]
  async fn test_internal_scope_skips_lookup() {
    let search = Arc::new(RecordingSearch::new("z"));
    let provider = ContextProvider::new()
      .with_documents(Arc::new(StaticDocs(Some("docs".to_string()))))
      .with_search(search.clone());

    let ctx = provider.retrieve(&query(), SearchScope::Internal).await;
    assert_eq!(ctx.origin, ContextOrigin::None);
    assert!(ctx.text.is_empty());
    assert!(search.queries.lock().unwrap().is_empty());
    assert_eq!(ctx.prompt_section(), "Using internal knowledge base");
  }

  #[tokio::test]
  async fn test_local_documents_take_precedence() {
    let search = Arc::new(RecordingSearch::new("web"));
    let provider = ContextProvider::new()
      .with_documents(Arc::new(StaticDocs(Some("local docs".to_string()))))
      .with_search(search.clone());

    let ctx = provider.retrieve(&query(), SearchScope::Broad).await;
    assert_eq!(ctx.origin, ContextOrigin::Local);
    assert_eq!(ctx.text, "local docs");
    assert!(search.queries.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_empty_local_lookup_falls_through_to_search() {
    let search = Arc::new(RecordingSearch::new("web"));
    let provider = ContextProvider::new()
      .with_documents(Arc::new(StaticDocs(None)))
      .with_search(search.clone());

    let ctx = provider.retrieve(&query(), SearchScope::Narrow).await;
    assert_eq!(ctx.origin, ContextOrigin::Search);
    assert_eq!(ctx.prompt_section(), "Supplemental context:\nweb");
  }

  #[tokio::test]
  async fn test_search_failure_yields_empty_context() {
    let provider = ContextProvider::new().with_search(Arc::new(FailingSearch));
    let ctx = provider.retrieve(&query(), SearchScope::Broad).await;
    assert_eq!(ctx.origin, ContextOrigin::None);
    assert!(ctx.text.is_empty());
  }
}

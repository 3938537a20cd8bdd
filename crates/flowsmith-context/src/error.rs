/// Error type for context lookups.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("search request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("invalid search response: {message}")]
  InvalidResponse { message: String },
}

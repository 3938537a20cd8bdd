use thiserror::Error;

/// Error text fragments that identify a rate-limit failure.
///
/// HTTP 429 is classified by status code, not by text.
const RATE_LIMIT_MARKERS: &[&str] = &[
  "quota",
  "rate limit",
  "rate_limit",
  "ratelimit",
  "too many requests",
  "resource_exhausted",
];

/// Errors returned by an inference provider.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
  /// Recoverable by rotating to another credential.
  #[error("rate limited: {message}")]
  RateLimited { message: String },

  /// Fatal to the current call.
  #[error("provider call failed: {message}")]
  Fatal { message: String },

  #[error("credential pool is empty")]
  NoCredentials,
}

impl ProviderError {
  /// Classify a provider failure by its error text.
  pub fn from_message(message: impl Into<String>) -> Self {
    let message = message.into();
    let lower = message.to_lowercase();
    if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
      Self::RateLimited { message }
    } else {
      Self::Fatal { message }
    }
  }

  pub fn is_rate_limited(&self) -> bool {
    matches!(self, Self::RateLimited { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_classification() {
    assert!(ProviderError::from_message("429 Resource has been exhausted (e.g. check quota).").is_rate_limited());
    assert!(ProviderError::from_message("Rate limit reached for gpt-4o").is_rate_limited());
    assert!(ProviderError::from_message("RESOURCE_EXHAUSTED").is_rate_limited());
    assert_eq!(
      ProviderError::from_message("invalid api key"),
      ProviderError::Fatal {
        message: "invalid api key".to_string()
      }
    );
  }

  #[test]
  fn test_exceeded_limits_are_not_rate_limits() {
    for message in [
      r#"HTTP 400: {"error":{"code":"context_length_exceeded"}}"#,
      "HTTP 504: DEADLINE_EXCEEDED",
      "invalid key (request id req_84290af)",
    ] {
      assert!(
        !ProviderError::from_message(message).is_rate_limited(),
        "{}",
        message
      );
    }
  }
}

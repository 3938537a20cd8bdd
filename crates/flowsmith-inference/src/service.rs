use std::fmt;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::message::InferenceRequest;

/// A provider credential. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
  pub fn new(secret: impl Into<String>) -> Self {
    Self(secret.into())
  }

  pub fn secret(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Credential(<redacted>)")
  }
}

/// Stateless request/response access to a generative-reasoning provider.
#[async_trait]
pub trait InferenceService: Send + Sync {
  /// Run one call with the given credential and return the response text.
  async fn complete(
    &self,
    request: &InferenceRequest,
    credential: &Credential,
  ) -> Result<String, ProviderError>;
}

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::message::InferenceRequest;
use crate::service::{Credential, InferenceService};

/// Ordered provider credentials with a cursor and a cooldown.
#[derive(Debug, Clone)]
pub struct CredentialPool {
  credentials: Vec<Credential>,
  cursor: usize,
  cooldown: Duration,
}

impl CredentialPool {
  pub fn new(credentials: Vec<Credential>, cooldown: Duration) -> Result<Self, ProviderError> {
    if credentials.is_empty() {
      return Err(ProviderError::NoCredentials);
    }
    Ok(Self {
      credentials,
      cursor: 0,
      cooldown,
    })
  }

  /// Build a pool from raw secrets.
  pub fn from_secrets<I, S>(secrets: I, cooldown: Duration) -> Result<Self, ProviderError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::new(secrets.into_iter().map(Credential::new).collect(), cooldown)
  }

  pub fn current(&self) -> &Credential {
    &self.credentials[self.cursor]
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn cooldown(&self) -> Duration {
    self.cooldown
  }

  pub fn len(&self) -> usize {
    self.credentials.len()
  }

  pub fn is_empty(&self) -> bool {
    self.credentials.is_empty()
  }

  /// Advance the cursor cyclically. Returns the new cursor.
  pub fn advance(&mut self) -> usize {
    self.cursor = (self.cursor + 1) % self.credentials.len();
    self.cursor
  }

  /// The same credentials and cooldown with the cursor back at the first one.
  pub fn fresh(&self) -> Self {
    Self {
      credentials: self.credentials.clone(),
      cursor: 0,
      cooldown: self.cooldown,
    }
  }
}

/// An inference client that rotates credentials under rate limiting.
///
/// Each rate-limit failure advances the cursor and retries the same request.
/// When a call has failed on every credential in turn, the client waits for
/// the pool's cooldown before the next attempt. The wait is an async sleep
/// that only suspends this call.
pub struct RotatingClient {
  service: Arc<dyn InferenceService>,
  pool: Mutex<CredentialPool>,
  max_cycles: Option<u32>,
}

impl RotatingClient {
  pub fn new(service: Arc<dyn InferenceService>, pool: CredentialPool) -> Self {
    Self {
      service,
      pool: Mutex::new(pool),
      max_cycles: None,
    }
  }

  /// Give up with [`ProviderError::RateLimited`] after `cycles` full cycles.
  pub fn with_max_cycles(mut self, cycles: Option<u32>) -> Self {
    self.max_cycles = cycles;
    self
  }

  /// A client sharing the same service with its own pool state.
  pub fn fork(&self) -> Self {
    Self {
      service: self.service.clone(),
      pool: Mutex::new(self.pool().fresh()),
      max_cycles: self.max_cycles,
    }
  }

  /// Index of the credential the next call starts with.
  pub fn cursor(&self) -> usize {
    self.pool().cursor()
  }

  fn pool(&self) -> MutexGuard<'_, CredentialPool> {
    self.pool.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Run a request, rotating and cooling down as needed.
  pub async fn complete(&self, request: &InferenceRequest) -> Result<String, ProviderError> {
    let mut credential = self.pool().current().clone();
    let mut failures: usize = 0;
    let mut cycles: u32 = 0;

    loop {
      match self.service.complete(request, &credential).await {
        Ok(text) => return Ok(text),
        Err(ProviderError::RateLimited { message }) => {
          failures += 1;
          let (next, cursor, len, cooldown) = {
            let mut pool = self.pool();
            let cursor = pool.advance();
            (pool.current().clone(), cursor, pool.len(), pool.cooldown())
          };

          debug!(
            purpose = ?request.purpose,
            cursor,
            error = %message,
            "credential_rotated"
          );

          if failures % len == 0 {
            cycles += 1;
            if self.max_cycles.is_some_and(|max| cycles >= max) {
              warn!(purpose = ?request.purpose, cycles, "credential rotation gave up");
              return Err(ProviderError::RateLimited { message });
            }
            warn!(
              purpose = ?request.purpose,
              credentials = len,
              cooldown_ms = cooldown.as_millis() as u64,
              "credential_pool_exhausted"
            );
            tokio::time::sleep(cooldown).await;
          }

          credential = next;
        }
        Err(e) => return Err(e),
      }
    }
  }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable holding comma-separated provider credentials.
pub const API_KEYS_ENV: &str = "FLOWSMITH_API_KEYS";
/// Environment variable holding the web search credential.
pub const SEARCH_KEY_ENV: &str = "TAVILY_API_KEY";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
  #[error("invalid settings: {message}")]
  Invalid { message: String },
}

/// Engine settings, loaded from the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
  pub provider: ProviderSettings,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub search: Option<SearchSettings>,
  /// Directory of local integration documents, tried before web search.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub documentation_dir: Option<PathBuf>,
  /// Maximum number of node pipelines running at once. Unbounded if absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
  /// Any OpenAI-compatible chat completions endpoint.
  Openai,
  Gemini,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
  pub kind: ProviderKind,
  pub model: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub base_url: Option<String>,
  /// Ordered credential list used for rotation under rate limiting.
  #[serde(default)]
  pub api_keys: Vec<String>,
  /// Wait after every full rotation cycle.
  #[serde(default = "default_cooldown_secs")]
  pub cooldown_secs: u64,
  /// Give up after this many full rotation cycles. Unlimited if absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_cycles: Option<u32>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default)]
  pub generation_temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
  Tavily,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
  pub kind: SearchKind,
  #[serde(default)]
  pub api_key: String,
  #[serde(default = "default_max_results")]
  pub max_results: u32,
}

fn default_cooldown_secs() -> u64 {
  30
}

fn default_timeout_secs() -> u64 {
  60
}

fn default_max_results() -> u32 {
  5
}

impl EngineSettings {
  /// Apply overrides from the process environment.
  pub fn apply_env(&mut self) {
    self.apply_overrides(|name| std::env::var(name).ok());
  }

  /// Apply overrides from an arbitrary variable lookup.
  ///
  /// `FLOWSMITH_API_KEYS` replaces the credential list. `TAVILY_API_KEY`
  /// fills the search credential when the settings leave it empty.
  pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(keys) = lookup(API_KEYS_ENV) {
      let keys: Vec<String> = keys
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
      if !keys.is_empty() {
        self.provider.api_keys = keys;
      }
    }

    if let Some(search) = self.search.as_mut() {
      if search.api_key.is_empty() {
        if let Some(key) = lookup(SEARCH_KEY_ENV) {
          search.api_key = key;
        }
      }
    }
  }

  pub fn validate(&self) -> Result<(), SettingsError> {
    if self.provider.api_keys.is_empty() {
      return Err(SettingsError::Invalid {
        message: format!("provider.api_keys is empty (set it or {})", API_KEYS_ENV),
      });
    }
    if self.provider.model.trim().is_empty() {
      return Err(SettingsError::Invalid {
        message: "provider.model must not be empty".to_string(),
      });
    }
    if self.max_concurrency == Some(0) {
      return Err(SettingsError::Invalid {
        message: "max_concurrency must be > 0".to_string(),
      });
    }
    if self.provider.max_cycles == Some(0) {
      return Err(SettingsError::Invalid {
        message: "provider.max_cycles must be > 0".to_string(),
      });
    }
    if let Some(search) = &self.search {
      if search.api_key.is_empty() {
        return Err(SettingsError::Invalid {
          message: format!("search.api_key is empty (set it or {})", SEARCH_KEY_ENV),
        });
      }
    }
    Ok(())
  }
}

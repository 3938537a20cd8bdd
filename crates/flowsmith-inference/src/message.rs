use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  User,
  Assistant,
}

/// One exchanged message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub role: Role,
  pub content: String,
}

impl Message {
  pub fn user(content: impl Into<String>) -> Self {
    Self {
      role: Role::User,
      content: content.into(),
    }
  }

  pub fn assistant(content: impl Into<String>) -> Self {
    Self {
      role: Role::Assistant,
      content: content.into(),
    }
  }
}

/// What a request is for. Carried for logging and for test doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
  Confidence,
  Generation,
  Description,
  Validation,
  Merge,
}

/// A single inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
  pub purpose: Purpose,
  /// Rendered instruction template.
  pub system: String,
  /// Conversation so far, oldest first.
  pub messages: Vec<Message>,
  pub temperature: f32,
}

impl InferenceRequest {
  pub fn new(purpose: Purpose, system: impl Into<String>, temperature: f32) -> Self {
    Self {
      purpose,
      system: system.into(),
      messages: Vec::new(),
      temperature,
    }
  }

  pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
    self.messages = messages;
    self
  }

  pub fn with_message(mut self, message: Message) -> Self {
    self.messages.push(message);
    self
  }
}

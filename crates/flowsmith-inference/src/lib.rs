//! Flowsmith Inference
//!
//! Request/response access to a generative-reasoning provider.
//!
//! - [`InferenceService`] is the provider seam: one call, one credential.
//! - [`RotatingClient`] wraps a service with a [`CredentialPool`]. Rate-limit
//!   failures rotate to the next credential; a full unsuccessful cycle waits
//!   for the pool's cooldown before the next attempt. Any other failure is
//!   returned immediately.
//! - [`OpenAiProvider`] and [`GeminiProvider`] are HTTP implementations.

mod error;
mod gemini;
mod message;
mod openai;
mod rotation;
mod service;

pub use error::ProviderError;
pub use gemini::GeminiProvider;
pub use message::{InferenceRequest, Message, Purpose, Role};
pub use openai::OpenAiProvider;
pub use rotation::{CredentialPool, RotatingClient};
pub use service::{Credential, InferenceService};

//! Flowsmith Context
//!
//! Supplies background text for generation.
//!
//! The [`DocumentStore`] and [`SearchProvider`] traits are the backend seams.
//! [`ContextProvider`] picks how much lookup to do from a confidence score
//! ([`SearchScope`]), tries local documents before web search, and bounds the
//! amount of text attached to a prompt.

mod error;
mod fs;
mod provider;
mod source;
mod tavily;

pub use error::ContextError;
pub use fs::FsDocumentStore;
pub use provider::{
  BROAD_LIMIT, ContextOrigin, ContextProvider, ContextQuery, NARROW_LIMIT, RetrievedContext,
  SearchScope,
};
pub use source::{DocumentStore, SearchProvider, Snippet};
pub use tavily::TavilySearch;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ContextError;
use crate::source::DocumentStore;

/// Extensions tried in order for `<integration>_docs.<ext>`.
const DOC_EXTENSIONS: &[&str] = &["json", "md", "txt"];

/// Filesystem document store.
///
/// Documents live at `<root>/<integration>_docs.<ext>`.
pub struct FsDocumentStore {
  root: PathBuf,
}

impl FsDocumentStore {
  pub fn new(root: impl AsRef<Path>) -> Self {
    Self {
      root: root.as_ref().to_path_buf(),
    }
  }

  fn candidates(&self, integration: &str) -> impl Iterator<Item = PathBuf> + '_ {
    let stem = integration.trim().replace(['/', '\\'], "_");
    DOC_EXTENSIONS
      .iter()
      .map(move |ext| self.root.join(format!("{}_docs.{}", stem, ext)))
  }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
  async fn lookup(&self, integration: &str) -> Result<Option<String>, ContextError> {
    for path in self.candidates(integration) {
      match tokio::fs::read_to_string(&path).await {
        Ok(content) if content.trim().is_empty() => continue,
        Ok(content) => return Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
        Err(e) => return Err(e.into()),
      }
    }
    Ok(None)
  }
}

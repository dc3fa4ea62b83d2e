//! Notes and the host knowledge-base capabilities the publisher relies on.
//!
//! The publisher never owns note storage. It reads notes handed to it, looks
//! other notes up through [`NoteLookup`] to resolve cross-links, and writes
//! back a single metadata field through [`NoteStore`].

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::markup::Node;

/// Custom metadata key holding the id of the Confluence page for a note.
pub const PAGE_ID_KEY: &str = "pageId";

/// Custom metadata key holding the last page version the note was published
/// as. The vault records it after each successful publish.
pub const PAGE_VERSION_KEY: &str = "pageVersion";

/// Boxed error returned by host-engine collaborators.
pub type StoreError = Box<dyn StdError + Send + Sync + 'static>;

/// A note from the knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
  /// Stable identifier, used as the target of cross-links.
  pub id: String,
  /// File name without extension (Dendron-style hierarchy name).
  pub fname: String,
  /// Human-readable title; becomes the Confluence page title.
  pub title: String,
  /// Markdown body without frontmatter.
  pub body: String,
  /// Root of the vault the note belongs to. Attachment references resolve
  /// against it.
  pub vault_path: PathBuf,
  /// Open-ended custom metadata.
  pub custom: BTreeMap<String, Value>,
}

impl Note {
  /// Create a note with empty custom metadata.
  pub fn new(
    id: impl Into<String>,
    title: impl Into<String>,
    body: impl Into<String>,
    vault_path: impl Into<PathBuf>,
  ) -> Self {
    let id = id.into();
    Self {
      fname: id.clone(),
      id,
      title: title.into(),
      body: body.into(),
      vault_path: vault_path.into(),
      custom: BTreeMap::new(),
    }
  }

  /// Id of the Confluence page this note was published to.
  ///
  /// YAML frontmatter frequently carries numeric ids unquoted, so numbers are
  /// accepted as well as strings. Blank values mean "unpublished".
  pub fn page_id(&self) -> Option<String> {
    let id = match self.custom.get(PAGE_ID_KEY)? {
      Value::String(id) => id.trim().to_string(),
      Value::Number(number) => number.to_string(),
      _ => return None,
    };

    if id.is_empty() { None } else { Some(id) }
  }

  /// Record the Confluence page id for this note.
  pub fn set_page_id(&mut self, page_id: impl Into<String>) {
    self
      .custom
      .insert(PAGE_ID_KEY.to_string(), Value::String(page_id.into()));
  }

  /// Last published page version, if the host recorded one.
  pub fn page_version(&self) -> Option<u64> {
    match self.custom.get(PAGE_VERSION_KEY)? {
      Value::Number(number) => number.as_u64(),
      Value::String(text) => text.trim().parse().ok(),
      _ => None,
    }
  }

  /// Record the page version this note was last published as.
  pub fn set_page_version(&mut self, version: u64) {
    self.custom.insert(PAGE_VERSION_KEY.to_string(), Value::from(version));
  }

  /// Whether the note has been published before.
  pub fn is_published(&self) -> bool {
    self.page_id().is_some()
  }
}

/// Resolve cross-link targets to notes.
pub trait NoteLookup: Send + Sync {
  /// Find a note by id. Returns `None` when no such note exists.
  fn find_note(&self, id: &str) -> Option<Note>;
}

/// Persistence and rendering capabilities of the host knowledge base.
#[async_trait]
pub trait NoteStore: NoteLookup {
  /// Durably persist the note, replacing the existing copy.
  async fn write_note(&self, note: &Note) -> Result<(), StoreError>;

  /// Parse the note body into a document tree.
  fn document_tree(&self, note: &Note) -> Result<Node, StoreError>;
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn note() -> Note {
    Note::new("daily.journal", "Journal", "", "/vault")
  }

  #[test]
  fn test_page_id_absent_by_default() {
    let note = note();
    assert_eq!(note.page_id(), None);
    assert!(!note.is_published());
  }

  #[test]
  fn test_page_id_accepts_numbers_and_strings() {
    let mut note = note();
    note.custom.insert(PAGE_ID_KEY.to_string(), json!(5555544444u64));
    assert_eq!(note.page_id().as_deref(), Some("5555544444"));

    note.set_page_id("0123456789");
    assert_eq!(note.page_id().as_deref(), Some("0123456789"));
    assert!(note.is_published());
  }

  #[test]
  fn test_blank_page_id_is_unpublished() {
    let mut note = note();
    note.set_page_id("   ");
    assert_eq!(note.page_id(), None);

    note.custom.insert(PAGE_ID_KEY.to_string(), Value::Null);
    assert_eq!(note.page_id(), None);
  }

  #[test]
  fn test_page_version_parses_numbers_and_strings() {
    let mut note = note();
    assert_eq!(note.page_version(), None);

    note.custom.insert(PAGE_VERSION_KEY.to_string(), json!(7));
    assert_eq!(note.page_version(), Some(7));

    note.custom.insert(PAGE_VERSION_KEY.to_string(), json!("8"));
    assert_eq!(note.page_version(), Some(8));

    note.set_page_version(9);
    assert_eq!(note.custom.get(PAGE_VERSION_KEY), Some(&json!(9)));
    assert_eq!(note.page_version(), Some(9));
  }

  #[test]
  fn test_new_uses_id_as_fname() {
    assert_eq!(note().fname, "daily.journal");
  }
}

//! In-memory note store for publisher tests.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use confluence_publish::markup::{Node, parse_markdown};
use confluence_publish::note::{Note, NoteLookup, NoteStore, StoreError};

/// Note store that keeps notes in a map and records every write.
#[derive(Default)]
pub struct MemoryNoteStore {
  notes: Mutex<HashMap<String, Note>>,
  writes: Mutex<Vec<Note>>,
  fail_writes: bool,
  fail_render: bool,
}

impl MemoryNoteStore {
  /// Create a store holding `notes`.
  pub fn new(notes: impl IntoIterator<Item = Note>) -> Self {
    Self {
      notes: Mutex::new(notes.into_iter().map(|note| (note.id.clone(), note)).collect()),
      ..Self::default()
    }
  }

  /// Make every `write_note` fail.
  pub fn failing_writes(mut self) -> Self {
    self.fail_writes = true;
    self
  }

  /// Make every `document_tree` fail.
  pub fn failing_render(mut self) -> Self {
    self.fail_render = true;
    self
  }

  /// Notes passed to `write_note`, in order.
  pub fn writes(&self) -> Vec<Note> {
    self.writes.lock().unwrap().clone()
  }

  /// Current copy of a note.
  pub fn note(&self, id: &str) -> Option<Note> {
    self.notes.lock().unwrap().get(id).cloned()
  }
}

impl NoteLookup for MemoryNoteStore {
  fn find_note(&self, id: &str) -> Option<Note> {
    self.note(id)
  }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
  async fn write_note(&self, note: &Note) -> Result<(), StoreError> {
    if self.fail_writes {
      return Err(Box::new(io::Error::new(io::ErrorKind::PermissionDenied, "read-only vault")));
    }

    self.writes.lock().unwrap().push(note.clone());
    self.notes.lock().unwrap().insert(note.id.clone(), note.clone());
    Ok(())
  }

  fn document_tree(&self, note: &Note) -> Result<Node, StoreError> {
    if self.fail_render {
      return Err(Box::new(io::Error::other(format!("cannot parse {}", note.id))));
    }

    Ok(parse_markdown(&note.body, self))
  }
}

//! Filesystem vault: a directory of markdown notes with YAML frontmatter.
//!
//! Notes are indexed once when the vault is opened. Lookups resolve by note
//! id first and file name second. Writing a note rewrites its frontmatter and
//! keeps the body exactly as it was read.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use tracing::{debug, trace};

use crate::markup::{Node, parse_markdown};
use crate::note::{Note, NoteLookup, NoteStore, StoreError};

const FRONTMATTER_FENCE: &str = "---";

/// Directories never scanned for notes.
const SKIPPED_DIRS: &[&str] = &["node_modules"];

/// Errors raised while loading or saving vault notes.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
  /// Reading or writing a file failed.
  #[error("I/O error on {}", path.display())]
  Io {
    /// File or directory involved.
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Frontmatter is not valid YAML or has unexpected types.
  #[error("Invalid frontmatter in {}", path.display())]
  Frontmatter {
    /// Offending note file.
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  /// `custom` metadata cannot be represented as JSON.
  #[error("Invalid custom metadata in {}", path.display())]
  Metadata {
    /// Offending note file.
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// Two files declare the same note id.
  #[error("Note id '{id}' is used by both {} and {}", first.display(), second.display())]
  DuplicateId {
    /// Duplicated id.
    id: String,
    /// File indexed first.
    first: PathBuf,
    /// File indexed second.
    second: PathBuf,
  },

  /// The note is not part of this vault.
  #[error("Note '{0}' is not in the vault")]
  UnknownNote(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Frontmatter {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  custom: Option<Mapping>,
  #[serde(flatten)]
  extra: Mapping,
}

#[derive(Debug, Clone)]
struct Entry {
  note: Note,
  file: PathBuf,
  extra: Mapping,
}

/// A directory of notes.
#[derive(Debug)]
pub struct Vault {
  root: PathBuf,
  entries: RwLock<BTreeMap<String, Entry>>,
}

impl Vault {
  /// Index every note under `root`.
  ///
  /// # Errors
  /// Fails on unreadable files, malformed frontmatter or duplicate ids.
  pub fn open(root: impl Into<PathBuf>) -> Result<Self, VaultError> {
    let root = root.into();
    let mut files = Vec::new();
    collect_markdown_files(&root, &mut files)?;
    files.sort();

    let mut entries: BTreeMap<String, Entry> = BTreeMap::new();
    for file in files {
      let entry = load_entry(&root, &file)?;
      if let Some(existing) = entries.get(&entry.note.id) {
        return Err(VaultError::DuplicateId {
          id: entry.note.id,
          first: existing.file.clone(),
          second: file,
        });
      }
      trace!("Indexed note '{}' from {}", entry.note.id, file.display());
      entries.insert(entry.note.id.clone(), entry);
    }

    debug!("Loaded {} notes from {}", entries.len(), root.display());

    Ok(Self {
      root,
      entries: RwLock::new(entries),
    })
  }

  /// Vault root directory.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Number of indexed notes.
  pub fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Whether the vault has no notes.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Resolve a command-line note argument: a note id, a file name, or a
  /// path to a markdown file.
  pub fn resolve(&self, reference: &str) -> Option<Note> {
    if let Some(note) = self.find_note(reference) {
      return Some(note);
    }

    let path = Path::new(reference);
    if path.extension().is_some_and(|ext| ext == "md") {
      let stem = path.file_stem()?.to_str()?;
      return self.find_note(stem);
    }

    None
  }

  /// File a note was loaded from.
  pub fn note_file(&self, id: &str) -> Option<PathBuf> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries.get(id).map(|entry| entry.file.clone())
  }

  /// Persist `note` back to its file.
  ///
  /// # Errors
  /// Fails when the note is not in the vault or the file cannot be written.
  pub async fn save(&self, note: &Note) -> Result<(), VaultError> {
    let (file, extra) = {
      let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
      let entry = entries
        .get(&note.id)
        .ok_or_else(|| VaultError::UnknownNote(note.id.clone()))?;
      (entry.file.clone(), entry.extra.clone())
    };

    let contents = render_file(note, extra, &file)?;
    tokio::fs::write(&file, contents).await.map_err(|source| VaultError::Io {
      path: file.clone(),
      source,
    })?;
    debug!("Saved note '{}' to {}", note.id, file.display());

    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(entry) = entries.get_mut(&note.id) {
      entry.note = note.clone();
    }
    Ok(())
  }

  /// Store the page version a note was just published as, so the next
  /// publish can tell whether the page was edited in Confluence meanwhile.
  ///
  /// # Errors
  /// Same as [`Vault::save`].
  pub async fn record_page_version(&self, note: &mut Note, version: u64) -> Result<(), VaultError> {
    if note.page_version() == Some(version) {
      return Ok(());
    }
    note.set_page_version(version);
    self.save(note).await
  }
}

impl NoteLookup for Vault {
  fn find_note(&self, id: &str) -> Option<Note> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries
      .get(id)
      .or_else(|| entries.values().find(|entry| entry.note.fname == id))
      .map(|entry| entry.note.clone())
  }
}

#[async_trait]
impl NoteStore for Vault {
  async fn write_note(&self, note: &Note) -> Result<(), StoreError> {
    self.save(note).await.map_err(StoreError::from)
  }

  fn document_tree(&self, note: &Note) -> Result<Node, StoreError> {
    Ok(parse_markdown(&note.body, self))
  }
}

fn collect_markdown_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), VaultError> {
  let io_error = |source| VaultError::Io {
    path: dir.to_path_buf(),
    source,
  };

  for entry in fs::read_dir(dir).map_err(io_error)? {
    let entry = entry.map_err(io_error)?;
    let path = entry.path();
    let name = entry.file_name();
    let name = name.to_string_lossy();

    if entry.file_type().map_err(io_error)?.is_dir() {
      if !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref()) {
        collect_markdown_files(&path, files)?;
      }
    } else if path.extension().is_some_and(|ext| ext == "md") {
      files.push(path);
    }
  }

  Ok(())
}

fn load_entry(root: &Path, file: &Path) -> Result<Entry, VaultError> {
  let contents = fs::read_to_string(file).map_err(|source| VaultError::Io {
    path: file.to_path_buf(),
    source,
  })?;

  let (frontmatter, body) = match split_frontmatter(&contents) {
    Some((yaml, body)) => {
      let frontmatter = if yaml.trim().is_empty() {
        Frontmatter::default()
      } else {
        serde_yaml::from_str(yaml).map_err(|source| VaultError::Frontmatter {
          path: file.to_path_buf(),
          source,
        })?
      };
      (frontmatter, body)
    }
    None => (Frontmatter::default(), contents.as_str()),
  };

  let fname = file
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default();

  let custom = match frontmatter.custom {
    Some(custom) => serde_json::to_value(custom)
      .and_then(serde_json::from_value)
      .map_err(|source| VaultError::Metadata {
        path: file.to_path_buf(),
        source,
      })?,
    None => BTreeMap::new(),
  };

  let note = Note {
    id: frontmatter.id.unwrap_or_else(|| fname.clone()),
    title: frontmatter.title.unwrap_or_else(|| title_from_fname(&fname)),
    body: body.to_string(),
    vault_path: root.to_path_buf(),
    custom,
    fname,
  };

  Ok(Entry {
    note,
    file: file.to_path_buf(),
    extra: frontmatter.extra,
  })
}

/// Split `---` delimited frontmatter from the body.
///
/// # Returns
/// The YAML text and the body, or `None` when the file has no frontmatter.
fn split_frontmatter(contents: &str) -> Option<(&str, &str)> {
  let rest = contents
    .strip_prefix(FRONTMATTER_FENCE)?
    .strip_prefix("\r\n")
    .or_else(|| contents.strip_prefix(FRONTMATTER_FENCE)?.strip_prefix('\n'))?;

  let mut offset = 0;
  for line in rest.split_inclusive('\n') {
    if line.trim_end_matches(['\r', '\n']) == FRONTMATTER_FENCE {
      return Some((&rest[..offset], &rest[offset + line.len()..]));
    }
    offset += line.len();
  }

  None
}

fn render_file(note: &Note, extra: Mapping, file: &Path) -> Result<String, VaultError> {
  let custom = if note.custom.is_empty() {
    None
  } else {
    let value = serde_yaml::to_value(&note.custom).map_err(|source| VaultError::Frontmatter {
      path: file.to_path_buf(),
      source,
    })?;
    match value {
      serde_yaml::Value::Mapping(mapping) => Some(mapping),
      _ => None,
    }
  };

  let frontmatter = Frontmatter {
    id: Some(note.id.clone()),
    title: Some(note.title.clone()),
    custom,
    extra,
  };

  let yaml = serde_yaml::to_string(&frontmatter).map_err(|source| VaultError::Frontmatter {
    path: file.to_path_buf(),
    source,
  })?;

  Ok(format!("{FRONTMATTER_FENCE}\n{yaml}{FRONTMATTER_FENCE}\n{}", note.body))
}

/// Title for a note without one: the last hierarchy segment in title case.
fn title_from_fname(fname: &str) -> String {
  let segment = fname.rsplit('.').next().unwrap_or(fname);
  segment
    .split(['-', '_', ' '])
    .filter(|word| !word.is_empty())
    .map(|word| {
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
      }
    })
    .collect::<Vec<String>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_split_frontmatter() {
    let contents = "---\nid: abc\ntitle: ABC\n---\n# Body\n\ntext\n";
    assert_eq!(
      split_frontmatter(contents),
      Some(("id: abc\ntitle: ABC\n", "# Body\n\ntext\n"))
    );
  }

  #[test]
  fn test_split_frontmatter_crlf() {
    let contents = "---\r\nid: abc\r\n---\r\nbody";
    assert_eq!(split_frontmatter(contents), Some(("id: abc\r\n", "body")));
  }

  #[test]
  fn test_split_frontmatter_absent_or_unterminated() {
    assert_eq!(split_frontmatter("# Just a body"), None);
    assert_eq!(split_frontmatter("---\nid: abc\nno closing fence"), None);
    assert_eq!(split_frontmatter("----\nnot frontmatter\n---\n"), None);
  }

  #[test]
  fn test_title_from_fname() {
    assert_eq!(title_from_fname("daily.journal.meeting-notes"), "Meeting Notes");
    assert_eq!(title_from_fname("root"), "Root");
    assert_eq!(title_from_fname("a.b_c"), "B C");
  }
}

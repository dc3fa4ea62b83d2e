//! Attachment reference extraction.
//!
//! Finds the local files a rendered page refers to so they can be uploaded
//! as page attachments before (or while) the page content is updated.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::markup::{decode_entities, is_remote_url};

/// Wiki image markup (`!ref!`, `!ref|width=300!`) or a storage-format
/// attachment resource (`ri:filename="ref"`).
///
/// Neither half of the wiki form may contain markup characters, so two
/// exclamation marks in neighbouring elements never pair up.
static ATTACHMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"ri:filename="([^"]*)"|!([^!\s|<>"=]+)(?:\|[^!\n<>]*)?!"#).expect("attachment pattern is valid")
});

/// A local file referenced from page content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentReference {
  /// Identifier exactly as written in the content; becomes the attachment
  /// title on the page.
  pub title: String,
  /// Location of the file on disk.
  pub path: PathBuf,
}

impl AttachmentReference {
  /// Resolve `title` against the directory a note lives in.
  ///
  /// A leading `/` means "relative to the vault root", not the filesystem
  /// root.
  pub fn resolve(title: impl Into<String>, vault_path: &Path) -> Self {
    let title = title.into();
    let relative = title.trim_start_matches(['/', '\\']);
    let path = vault_path.join(relative);
    Self { title, path }
  }
}

/// Extract attachment identifiers from rendered page content.
///
/// Identifiers are returned in text order. Duplicates are kept and remote
/// URLs are skipped. Scanning the same content twice yields the same list.
///
/// # Arguments
/// * `content` - Page content in storage format or wiki markup.
///
/// # Returns
/// The identifiers with XML entities decoded.
pub fn extract_attachments(content: &str) -> Vec<String> {
  ATTACHMENT_PATTERN
    .captures_iter(content)
    .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
    .map(|m| decode_entities(m.as_str()))
    .filter(|reference| !reference.trim().is_empty() && !is_remote_url(reference))
    .collect()
}

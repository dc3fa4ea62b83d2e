//! Document trees and their conversion into Confluence storage format.
//!
//! # Architecture
//!
//! - [`tree`] - the HTML-like [`Node`] tree and its storage-format serializer
//! - [`markdown`] - builds a [`Node`] tree from a note's markdown body
//! - [`transform`] - rewrites images, note links and the provenance banner
//!
//! # Example
//!
//! ```
//! use confluence_publish::markup::{StorageOptions, parse_markdown, to_storage_format};
//! use confluence_publish::note::{Note, NoteLookup};
//!
//! struct NoNotes;
//! impl NoteLookup for NoNotes {
//!   fn find_note(&self, _id: &str) -> Option<Note> {
//!     None
//!   }
//! }
//!
//! let tree = parse_markdown("![logo](/assets/logo.png)", &NoNotes);
//! let storage = to_storage_format(tree, &NoNotes, &StorageOptions::default());
//! assert_eq!(
//!   storage,
//!   r#"<p><ac:image><ri:attachment ri:filename="/assets/logo.png"></ri:attachment></ac:image></p>"#
//! );
//! ```

pub mod markdown;
pub mod transform;
pub mod tree;

pub use markdown::parse_markdown;
pub use transform::{StorageOptions, to_storage_format, to_storage_tree};
pub use tree::{Element, Node, NodeKind};
use url::Url;

/// URL schemes treated as remote resources rather than page attachments.
const REMOTE_SCHEMES: &[&str] = &["http", "https", "ftp", "ftps"];

/// Whether `reference` is a fully-qualified URL with a recognised scheme.
///
/// Relative and vault-rooted paths (`assets/a.png`, `/assets/a.png`) are not
/// URLs. Neither are Windows drive paths, whose single-letter "scheme" is not
/// in the recognised list.
pub fn is_remote_url(reference: &str) -> bool {
  Url::parse(reference.trim()).is_ok_and(|url| REMOTE_SCHEMES.contains(&url.scheme()))
}

/// Decode the XML entities the storage serializer produces, plus numeric
/// character references.
pub(crate) fn decode_entities(value: &str) -> String {
  if !value.contains('&') {
    return value.to_string();
  }

  let mut out = String::with_capacity(value.len());
  let mut rest = value;
  while let Some(start) = rest.find('&') {
    out.push_str(&rest[..start]);
    let tail = &rest[start..];
    let decoded = tail.find(';').and_then(|end| {
      let entity = &tail[1..end];
      let c = match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => entity
          .strip_prefix("#x")
          .or_else(|| entity.strip_prefix("#X"))
          .and_then(|hex| u32::from_str_radix(hex, 16).ok())
          .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
          .and_then(char::from_u32),
      };
      c.map(|c| (c, end + 1))
    });

    match decoded {
      Some((c, consumed)) => {
        out.push(c);
        rest = &tail[consumed..];
      }
      None => {
        out.push('&');
        rest = &tail[1..];
      }
    }
  }
  out.push_str(rest);
  out
}

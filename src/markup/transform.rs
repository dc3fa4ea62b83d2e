//! Rewrite a generic document tree into Confluence storage format.
//!
//! Images become `ac:image` macros, links to already-published notes become
//! `ac:link` page links, and an optional info banner is prepended to the
//! document. The walk is a single pre-order pass; nodes produced by a rewrite
//! are never visited again.

use tracing::trace;

use super::is_remote_url;
use super::tree::{Element, Node, NodeKind};
use crate::note::{Note, NoteLookup};

/// Homepage linked from the provenance banner.
pub const PROVENANCE_URL: &str = "https://www.dendron.so";

/// Name shown for the source system in the provenance banner.
pub const PROVENANCE_NAME: &str = "Dendron";

/// Options that control the storage-format rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageOptions {
  /// Prepend an info macro stating the page was exported.
  pub include_provenance_banner: bool,
}

/// Transform `tree` into its storage-format equivalent.
///
/// # Arguments
/// * `tree` - Document produced by the markdown front end.
/// * `lookup` - Resolves link targets to notes so published notes can be
///   linked as Confluence pages.
/// * `options` - Rewrite options.
pub fn to_storage_tree<L>(tree: Node, lookup: &L, options: &StorageOptions) -> Node
where
  L: NoteLookup + ?Sized,
{
  visit(tree, lookup, options, 0)
}

/// Transform `tree` and serialize the result.
pub fn to_storage_format<L>(tree: Node, lookup: &L, options: &StorageOptions) -> String
where
  L: NoteLookup + ?Sized,
{
  to_storage_tree(tree, lookup, options).to_storage()
}

fn visit<L>(node: Node, lookup: &L, options: &StorageOptions, depth: usize) -> Node
where
  L: NoteLookup + ?Sized,
{
  let rewritten = match node.kind() {
    NodeKind::Root => None,
    NodeKind::Image { src: Some(src) } => Some(image_macro(src)),
    NodeKind::Image { src: None } => None,
    NodeKind::Link { href: Some(href) } => published_target(href, lookup).map(|(note, anchor)| page_link(&note, anchor)),
    NodeKind::Link { href: None } => None,
    NodeKind::Other => None,
  };

  if let Some(replacement) = rewritten {
    return replacement;
  }

  match node {
    Node::Root(children) => {
      let mut out = Vec::with_capacity(children.len() + 1);
      if options.include_provenance_banner && depth == 0 {
        out.push(provenance_banner());
      }
      out.extend(
        children
          .into_iter()
          .map(|child| visit(child, lookup, options, depth + 1)),
      );
      Node::Root(out)
    }
    Node::Element(mut element) => {
      element.children = element
        .children
        .into_iter()
        .map(|child| visit(child, lookup, options, depth + 1))
        .collect();
      Node::Element(element)
    }
    leaf @ (Node::Text(_) | Node::Raw(_)) => leaf,
  }
}

/// Resolve a link target to a published note, splitting off any `#anchor`.
fn published_target<'h, L>(href: &'h str, lookup: &L) -> Option<(Note, Option<&'h str>)>
where
  L: NoteLookup + ?Sized,
{
  if is_remote_url(href) {
    return None;
  }

  let (id, anchor) = match href.split_once('#') {
    Some((id, anchor)) => (id, Some(anchor).filter(|a| !a.is_empty())),
    None => (href, None),
  };

  if id.is_empty() {
    return None;
  }

  let note = lookup.find_note(id)?;
  if !note.is_published() {
    trace!("Link target '{id}' is not published; leaving link as-is");
    return None;
  }

  Some((note, anchor))
}

/// `<ac:image>` referencing either a page attachment or a remote URL.
fn image_macro(src: &str) -> Node {
  let resource = if is_remote_url(src) {
    Element::new("ri:url").with_attr("ri:value", src)
  } else {
    Element::new("ri:attachment").with_attr("ri:filename", src)
  };

  Element::new("ac:image").with_child(resource).into()
}

/// `<ac:link>` to the Confluence page of a published note.
fn page_link(note: &Note, anchor: Option<&str>) -> Node {
  let mut link = Element::new("ac:link");
  if let Some(anchor) = anchor {
    link.set_attr("ac:anchor", anchor);
  }

  link
    .with_child(Element::new("ri:page").with_attr("ri:content-title", &note.title))
    .with_child(Element::new("ac:plain-text-link-body").with_child(Node::text(&note.title)))
    .into()
}

/// Info macro announcing that the page is generated.
fn provenance_banner() -> Node {
  let paragraph = Element::new("p")
    .with_child(Node::text("This page was exported from "))
    .with_child(
      Element::new("a")
        .with_attr("href", PROVENANCE_URL)
        .with_child(Node::text(PROVENANCE_NAME)),
    )
    .with_child(Node::text(
      ". Changes made to this page directly may be overwritten.",
    ));

  Element::new("ac:structured-macro")
    .with_attr("ac:name", "info")
    .with_child(Element::new("ac:rich-text-body").with_child(paragraph))
    .into()
}

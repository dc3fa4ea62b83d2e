//! HTML-like document tree shared by the markdown front end and the storage
//! format transformer.

/// A node in a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
  /// Top of a document. Only ever appears once, at the top.
  Root(Vec<Node>),
  /// A tagged element such as `p`, `img` or `ac:link`.
  Element(Element),
  /// Literal text, escaped on output.
  Text(String),
  /// Pre-rendered markup emitted verbatim (text content and comments of
  /// HTML embedded in the source note).
  Raw(String),
}

/// A tagged element with ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
  /// Tag name, including any namespace prefix (`ac:image`).
  pub tag: String,
  /// Attributes in insertion order.
  pub attrs: Vec<(String, String)>,
  /// Child nodes.
  pub children: Vec<Node>,
}

/// Classification of a node for the storage-format rewrite.
///
/// Every node the transformer sees falls into exactly one of these; adding a
/// kind forces every match over it to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind<'a> {
  /// The document root.
  Root,
  /// An `img` element and its `src`, if present.
  Image { src: Option<&'a str> },
  /// An `a` element and its `href`, if present.
  Link { href: Option<&'a str> },
  /// Everything else.
  Other,
}

/// HTML elements that never have content; rendered self-closed.
pub(crate) const VOID_TAGS: &[&str] = &[
  "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

impl Element {
  /// Create an element with no attributes or children.
  pub fn new(tag: impl Into<String>) -> Self {
    Self {
      tag: tag.into(),
      ..Self::default()
    }
  }

  /// Builder-style attribute setter.
  pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.set_attr(name, value);
    self
  }

  /// Builder-style child appender.
  pub fn with_child(mut self, child: impl Into<Node>) -> Self {
    self.children.push(child.into());
    self
  }

  /// Look up an attribute value.
  pub fn attr(&self, name: &str) -> Option<&str> {
    self
      .attrs
      .iter()
      .find(|(key, _)| key == name)
      .map(|(_, value)| value.as_str())
  }

  /// Set or replace an attribute value.
  pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    let value = value.into();
    match self.attrs.iter_mut().find(|(key, _)| *key == name) {
      Some(slot) => slot.1 = value,
      None => self.attrs.push((name, value)),
    }
  }

  /// Concatenated text content of the element's descendants.
  pub fn text_content(&self) -> String {
    let mut out = String::new();
    self.children.iter().for_each(|child| collect_text(child, &mut out));
    out
  }
}

impl From<Element> for Node {
  fn from(element: Element) -> Self {
    Node::Element(element)
  }
}

impl Node {
  /// Convenience constructor for a text node.
  pub fn text(value: impl Into<String>) -> Self {
    Node::Text(value.into())
  }

  /// Classify this node.
  pub fn kind(&self) -> NodeKind<'_> {
    match self {
      Node::Root(_) => NodeKind::Root,
      Node::Element(element) => match element.tag.as_str() {
        "img" => NodeKind::Image {
          src: element.attr("src"),
        },
        "a" => NodeKind::Link {
          href: element.attr("href"),
        },
        _ => NodeKind::Other,
      },
      Node::Text(_) | Node::Raw(_) => NodeKind::Other,
    }
  }

  /// Concatenated text content of this node and its descendants.
  pub fn text_content(&self) -> String {
    let mut out = String::new();
    collect_text(self, &mut out);
    out
  }

  /// Serialize the tree into Confluence storage format.
  pub fn to_storage(&self) -> String {
    let mut out = String::new();
    write_node(self, &mut out);
    out
  }
}

fn collect_text(node: &Node, out: &mut String) {
  match node {
    Node::Text(text) => out.push_str(text),
    Node::Raw(_) => {}
    Node::Root(children) => children.iter().for_each(|child| collect_text(child, out)),
    Node::Element(element) => element.children.iter().for_each(|child| collect_text(child, out)),
  }
}

fn write_node(node: &Node, out: &mut String) {
  match node {
    Node::Root(children) => children.iter().for_each(|child| write_node(child, out)),
    Node::Text(text) => out.push_str(&escape_text(text)),
    Node::Raw(raw) => out.push_str(raw),
    Node::Element(element) => {
      out.push('<');
      out.push_str(&element.tag);
      for (name, value) in &element.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
      }

      if element.children.is_empty() && VOID_TAGS.contains(&element.tag.as_str()) {
        out.push_str(" />");
        return;
      }

      out.push('>');
      element.children.iter().for_each(|child| write_node(child, out));
      out.push_str("</");
      out.push_str(&element.tag);
      out.push('>');
    }
  }
}

fn escape_text(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      c => escaped.push(c),
    }
  }
  escaped
}

fn escape_attr(value: &str) -> String {
  escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_kind_classifies_images_and_links() {
    let img = Node::from(Element::new("img").with_attr("src", "a.png"));
    let link = Node::from(Element::new("a"));
    let para = Node::from(Element::new("p"));

    assert_eq!(img.kind(), NodeKind::Image { src: Some("a.png") });
    assert_eq!(link.kind(), NodeKind::Link { href: None });
    assert_eq!(para.kind(), NodeKind::Other);
    assert_eq!(Node::Root(Vec::new()).kind(), NodeKind::Root);
    assert_eq!(Node::text("img").kind(), NodeKind::Other);
  }

  #[test]
  fn test_set_attr_replaces_existing_value() {
    let mut element = Element::new("a").with_attr("href", "one");
    element.set_attr("href", "two");
    assert_eq!(element.attrs, vec![("href".to_string(), "two".to_string())]);
  }

  #[test]
  fn test_to_storage_escapes_text_and_attributes() {
    let node = Node::from(
      Element::new("a")
        .with_attr("href", "x?a=1&b=\"2\"")
        .with_child(Node::text("Fish & <Chips>")),
    );

    assert_eq!(
      node.to_storage(),
      r#"<a href="x?a=1&amp;b=&quot;2&quot;">Fish &amp; &lt;Chips&gt;</a>"#
    );
  }

  #[test]
  fn test_to_storage_closes_empty_elements_explicitly() {
    let node = Node::from(Element::new("ri:attachment").with_attr("ri:filename", "a.png"));
    assert_eq!(node.to_storage(), r#"<ri:attachment ri:filename="a.png"></ri:attachment>"#);
  }

  #[test]
  fn test_to_storage_self_closes_void_elements() {
    let node = Node::Root(vec![
      Element::new("p")
        .with_child(Node::text("a"))
        .with_child(Element::new("br"))
        .with_child(Node::text("b"))
        .into(),
      Element::new("hr").into(),
    ]);
    assert_eq!(node.to_storage(), "<p>a<br />b</p><hr />");
  }

  #[test]
  fn test_raw_passes_through() {
    let node = Node::Root(vec![Node::Raw("<span>&nbsp;</span>".to_string())]);
    assert_eq!(node.to_storage(), "<span>&nbsp;</span>");
  }

  #[test]
  fn test_text_content_skips_raw() {
    let node = Node::from(
      Element::new("h1")
        .with_child(Node::text("Hello "))
        .with_child(Element::new("em").with_child(Node::text("world")))
        .with_child(Node::Raw("<br>".to_string())),
    );
    assert_eq!(node.text_content(), "Hello world");
  }
}

//! Markdown front end: parse a note body into a [`Node`] tree.
//!
//! Parsing is done by `pulldown-cmark`; this module only folds its event
//! stream into a tree shaped like the HTML a browser would see, with heading
//! slugs and wiki links resolved the way the knowledge base renders them.
//!
//! HTML embedded in a note is tokenized into elements too, so a raw `<img>`
//! is rewritten like a markdown image and void tags such as `<br>` come out
//! well-formed.

use std::collections::HashMap;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::{Captures, Regex};

use super::decode_entities;
use super::tree::{Element, Node, VOID_TAGS};
use crate::note::NoteLookup;

/// `[[target]]`, `[[label|target]]` and embeds (`![[target]]`).
static WIKI_LINK: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(!?)\[\[([^\[\]\n|]+?)(?:\|([^\[\]\n]+?))?\]\]").expect("wiki link pattern is valid"));

/// A comment, or an opening, closing or self-closing tag in embedded HTML.
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9:-]*)((?:[^>"']|"[^"]*"|'[^']*')*?)\s*(/?)>"#)
    .expect("html tag pattern is valid")
});

/// One attribute of an HTML tag: bare, or with a quoted or unquoted value.
static HTML_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
    .expect("html attribute pattern is valid")
});

/// Block-level tags separated by a newline when they sit at the document root.
const BLOCK_TAGS: &[&str] = &[
  "p",
  "h1",
  "h2",
  "h3",
  "h4",
  "h5",
  "h6",
  "blockquote",
  "pre",
  "ul",
  "ol",
  "table",
  "hr",
];

/// Parse a markdown note body into a document tree.
///
/// # Arguments
/// * `body` - Markdown source without frontmatter.
/// * `lookup` - Used to label bare wiki links with the target note's title.
pub fn parse_markdown<L>(body: &str, lookup: &L) -> Node
where
  L: NoteLookup + ?Sized,
{
  let source = expand_wiki_links(body, lookup);

  let mut options = Options::empty();
  options.insert(Options::ENABLE_TABLES);
  options.insert(Options::ENABLE_STRIKETHROUGH);
  options.insert(Options::ENABLE_TASKLISTS);

  let mut builder = TreeBuilder::new();
  for event in Parser::new_ext(&source, options) {
    builder.handle(event);
  }
  builder.finish()
}

/// Rewrite wiki links into ordinary markdown links so the parser sees them as
/// `a` elements pointing at the target note id.
fn expand_wiki_links<L>(body: &str, lookup: &L) -> String
where
  L: NoteLookup + ?Sized,
{
  WIKI_LINK
    .replace_all(body, |caps: &Captures<'_>| {
      let original = caps[0].to_string();
      if &caps[1] == "!" {
        return original;
      }

      let (label, target) = match caps.get(3) {
        Some(target) => (Some(caps[2].trim().to_string()), target.as_str().trim()),
        None => (None, caps[2].trim()),
      };

      if target.is_empty() || target.contains(['<', '>']) {
        return original;
      }

      let label = label.unwrap_or_else(|| {
        let id = target.split('#').next().unwrap_or(target);
        lookup.find_note(id).map_or_else(|| target.to_string(), |note| note.title)
      });

      format!("[{}](<{target}>)", escape_label(&label))
    })
    .into_owned()
}

fn escape_label(label: &str) -> String {
  let mut escaped = String::with_capacity(label.len());
  for c in label.chars() {
    if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped
}

/// Apply the attributes written inside an HTML tag to `element`.
///
/// Bare attributes get their own name as value so the output stays XHTML.
fn parse_attributes(mut element: Element, source: &str) -> Element {
  for caps in HTML_ATTRIBUTE.captures_iter(source) {
    let name = caps[1].to_ascii_lowercase();
    let value = caps
      .get(2)
      .or_else(|| caps.get(3))
      .or_else(|| caps.get(4))
      .map_or_else(|| name.clone(), |m| decode_entities(m.as_str()));
    element.set_attr(name, value);
  }
  element
}

/// Move a markdown table's body rows under a `tbody`, after the `thead`.
fn wrap_table_body(table: &mut Element) {
  let (head, rows): (Vec<Node>, Vec<Node>) = std::mem::take(&mut table.children)
    .into_iter()
    .partition(|child| matches!(child, Node::Element(element) if element.tag == "thead"));
  table.children = head;
  if !rows.is_empty() {
    table.children.push(
      Element {
        tag: "tbody".to_string(),
        attrs: Vec::new(),
        children: rows,
      }
      .into(),
    );
  }
}

/// GitHub-style heading slug.
fn slugify(text: &str) -> String {
  text
    .trim()
    .to_lowercase()
    .chars()
    .filter_map(|c| match c {
      ' ' => Some('-'),
      c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
      _ => None,
    })
    .collect()
}

enum FrameKind {
  Element(Element),
  CodeBlock(Element),
  Image { src: String, title: String },
  TableHead,
  /// Raw HTML lines, tokenized once the whole block has been seen.
  HtmlBlock(String),
  /// An element opened by an HTML tag and not yet closed.
  Html(Element),
  Transparent,
}

struct Frame {
  kind: FrameKind,
  children: Vec<Node>,
}

impl Frame {
  fn new(kind: FrameKind) -> Self {
    Self {
      kind,
      children: Vec::new(),
    }
  }
}

struct TreeBuilder {
  stack: Vec<Frame>,
  slugs: HashMap<String, usize>,
  in_table_head: bool,
}

impl TreeBuilder {
  fn new() -> Self {
    Self {
      stack: vec![Frame::new(FrameKind::Transparent)],
      slugs: HashMap::new(),
      in_table_head: false,
    }
  }

  fn handle(&mut self, event: Event<'_>) {
    match event {
      Event::Start(tag) => self.open(tag),
      Event::End(TagEnd::HtmlBlock) => self.close_html_block(),
      Event::End(_) => {
        self.close_html_elements();
        self.close();
      }
      Event::Text(text) => self.push(Node::text(text.to_string())),
      Event::Code(code) => self.push(Element::new("code").with_child(Node::text(code.to_string())).into()),
      Event::Html(html) => match self.stack.last_mut() {
        Some(Frame {
          kind: FrameKind::HtmlBlock(source),
          ..
        }) => source.push_str(&html),
        _ => self.push_html(&html),
      },
      Event::InlineHtml(html) => self.push_html(&html),
      Event::SoftBreak => self.push(Node::text("\n")),
      Event::HardBreak => self.push(Element::new("br").into()),
      Event::Rule => self.push(Element::new("hr").into()),
      Event::TaskListMarker(checked) => self.push(Node::text(if checked { "[x] " } else { "[ ] " })),
      Event::FootnoteReference(name) => {
        self.push(Element::new("sup").with_child(Node::text(name.to_string())).into());
      }
      _ => {}
    }
  }

  fn open(&mut self, tag: Tag<'_>) {
    let kind = match tag {
      Tag::Paragraph => FrameKind::Element(Element::new("p")),
      Tag::Heading { level, id, .. } => {
        let mut heading = Element::new(format!("h{}", level as usize));
        if let Some(id) = id {
          heading.set_attr("id", id.to_string());
        }
        FrameKind::Element(heading)
      }
      Tag::BlockQuote(_) => FrameKind::Element(Element::new("blockquote")),
      Tag::CodeBlock(kind) => {
        let mut code = Element::new("code");
        if let CodeBlockKind::Fenced(info) = kind
          && let Some(lang) = info.split_whitespace().next()
        {
          code.set_attr("class", format!("language-{lang}"));
        }
        FrameKind::CodeBlock(code)
      }
      Tag::HtmlBlock => FrameKind::HtmlBlock(String::new()),
      Tag::List(Some(start)) => {
        let mut list = Element::new("ol");
        if start != 1 {
          list.set_attr("start", start.to_string());
        }
        FrameKind::Element(list)
      }
      Tag::List(None) => FrameKind::Element(Element::new("ul")),
      Tag::Item => FrameKind::Element(Element::new("li")),
      Tag::Table(_) => FrameKind::Element(Element::new("table")),
      Tag::TableHead => {
        self.in_table_head = true;
        FrameKind::TableHead
      }
      Tag::TableRow => FrameKind::Element(Element::new("tr")),
      Tag::TableCell => FrameKind::Element(Element::new(if self.in_table_head { "th" } else { "td" })),
      Tag::Emphasis => FrameKind::Element(Element::new("em")),
      Tag::Strong => FrameKind::Element(Element::new("strong")),
      Tag::Strikethrough => FrameKind::Element(Element::new("del")),
      Tag::Link { dest_url, title, .. } => {
        let mut link = Element::new("a").with_attr("href", dest_url.to_string());
        if !title.is_empty() {
          link.set_attr("title", title.to_string());
        }
        FrameKind::Element(link)
      }
      Tag::Image { dest_url, title, .. } => FrameKind::Image {
        src: dest_url.to_string(),
        title: title.to_string(),
      },
      _ => FrameKind::Transparent,
    };

    self.stack.push(Frame::new(kind));
  }

  fn close(&mut self) {
    // The bottom frame is the document itself and is never closed.
    if self.stack.len() < 2 {
      return;
    }
    let Some(frame) = self.stack.pop() else {
      return;
    };

    match frame.kind {
      FrameKind::Element(mut element) => {
        element.children = frame.children;
        if element.tag == "table" {
          wrap_table_body(&mut element);
        }
        if matches!(element.tag.as_bytes(), [b'h', b'1'..=b'6']) && element.attr("id").is_none() {
          let slug = self.unique_slug(&element.text_content());
          element.set_attr("id", slug);
        }
        self.push(element.into());
      }
      FrameKind::CodeBlock(mut code) => {
        code.children = frame.children;
        self.push(Element::new("pre").with_child(code).into());
      }
      FrameKind::Image { src, title } => {
        let alt = Node::Root(frame.children).text_content();
        let mut image = Element::new("img").with_attr("src", src);
        if !alt.is_empty() {
          image.set_attr("alt", alt);
        }
        if !title.is_empty() {
          image.set_attr("title", title);
        }
        self.push(image.into());
      }
      FrameKind::TableHead => {
        self.in_table_head = false;
        let row = Element {
          tag: "tr".to_string(),
          attrs: Vec::new(),
          children: frame.children,
        };
        self.push(Element::new("thead").with_child(row).into());
      }
      FrameKind::HtmlBlock(_) => {
        let mut children = frame.children.into_iter();
        if let Some(first) = children.next() {
          self.push_block(first);
          if let Some(parent) = self.stack.last_mut() {
            parent.children.extend(children);
          }
        }
      }
      FrameKind::Html(mut element) => {
        element.children = frame.children;
        self.push(element.into());
      }
      FrameKind::Transparent => {
        for child in frame.children {
          self.push(child);
        }
      }
    }
  }

  /// Tokenize embedded HTML into the current frame.
  ///
  /// Opening tags push a frame that the matching closing tag pops. Void and
  /// self-closed tags become childless elements. A closing tag with no open
  /// counterpart in the current markdown block is dropped.
  fn push_html(&mut self, html: &str) {
    let mut last = 0;
    for caps in HTML_TAG.captures_iter(html) {
      let Some(whole) = caps.get(0) else {
        continue;
      };
      self.push_html_text(&html[last..whole.start()]);
      last = whole.end();

      let Some(name) = caps.get(2) else {
        self.push(Node::Raw(whole.as_str().to_string()));
        continue;
      };
      let tag = name.as_str().to_ascii_lowercase();
      if caps.get(1).is_some_and(|slash| !slash.is_empty()) {
        self.close_html_element(&tag);
        continue;
      }

      let attrs = caps.get(3).map_or("", |m| m.as_str());
      let element = parse_attributes(Element::new(tag), attrs);
      let self_closed = caps.get(4).is_some_and(|slash| !slash.is_empty());
      if self_closed || VOID_TAGS.contains(&element.tag.as_str()) {
        self.push(element.into());
      } else {
        self.stack.push(Frame::new(FrameKind::Html(element)));
      }
    }
    self.push_html_text(&html[last..]);
  }

  /// Text between HTML tags. Entities are kept as written; stray angle
  /// brackets are escaped.
  fn push_html_text(&mut self, text: &str) {
    if !text.is_empty() {
      self.push(Node::Raw(text.replace('<', "&lt;").replace('>', "&gt;")));
    }
  }

  fn close_html_element(&mut self, tag: &str) {
    let Some(index) = self
      .stack
      .iter()
      .rposition(|frame| matches!(&frame.kind, FrameKind::Html(element) if element.tag == tag))
    else {
      return;
    };
    if self.stack[index + 1..]
      .iter()
      .any(|frame| !matches!(frame.kind, FrameKind::Html(_)))
    {
      return;
    }
    while self.stack.len() > index {
      self.close();
    }
  }

  /// Close HTML elements left open when their enclosing block ends.
  fn close_html_elements(&mut self) {
    while self.stack.len() > 1
      && matches!(
        self.stack.last(),
        Some(Frame {
          kind: FrameKind::Html(_),
          ..
        })
      )
    {
      self.close();
    }
  }

  fn close_html_block(&mut self) {
    let source = match self.stack.last_mut() {
      Some(Frame {
        kind: FrameKind::HtmlBlock(source),
        ..
      }) => std::mem::take(source),
      _ => String::new(),
    };
    self.push_html(source.trim_end());
    self.close_html_elements();
    self.close();
  }

  fn push(&mut self, node: Node) {
    let is_block = matches!(&node, Node::Element(element) if BLOCK_TAGS.contains(&element.tag.as_str()));
    if is_block {
      self.push_block(node);
    } else if let Some(parent) = self.stack.last_mut() {
      parent.children.push(node);
    }
  }

  fn push_block(&mut self, node: Node) {
    let at_root = self.stack.len() == 1;
    if let Some(parent) = self.stack.last_mut() {
      if at_root && !parent.children.is_empty() {
        parent.children.push(Node::text("\n"));
      }
      parent.children.push(node);
    }
  }

  fn unique_slug(&mut self, text: &str) -> String {
    let base = slugify(text);
    let seen = self.slugs.entry(base.clone()).or_insert(0);
    let slug = if *seen == 0 {
      base
    } else {
      format!("{base}-{seen}")
    };
    *seen += 1;
    slug
  }

  fn finish(mut self) -> Node {
    while self.stack.len() > 1 {
      self.close();
    }
    let children = self.stack.pop().map(|frame| frame.children).unwrap_or_default();
    Node::Root(children)
  }
}

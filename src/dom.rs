use crate::error::Error;
use crate::error::ParseError;
use crate::error::Result;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::Handle;
use markup5ever_rcdom::NodeData;
use markup5ever_rcdom::RcDom;
use std::io;

pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
  "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
  "wbr",
];

/// Elements whose text children are written verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Child-index path from a subtree root to one of its descendants.
///
/// The empty path addresses the root itself. Paths stay valid across in-place replacements of
/// other nodes because replacement never changes sibling counts.
pub type NodePath = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomNode {
  pub node_type: DomNodeType,
  pub children: Vec<DomNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNodeType {
  Document,
  Element {
    tag_name: String,
    namespace: String,
    attributes: Vec<(String, String)>,
  },
  Text {
    content: String,
  },
}

pub fn parse_html(html: &str) -> Result<DomNode> {
  let opts = ParseOpts {
    tree_builder: TreeBuilderOpts {
      scripting_enabled: false,
      ..Default::default()
    },
    ..Default::default()
  };

  let mut reader = io::Cursor::new(html.as_bytes());
  let dom = parse_document(RcDom::default(), opts)
    .from_utf8()
    .read_from(&mut reader)
    .map_err(|e| {
      Error::Parse(ParseError::InvalidHtml {
        message: format!("Failed to parse HTML: {}", e),
        line: 0,
      })
    })?;

  convert_handle_to_node(&dom.document).ok_or_else(|| {
    Error::Parse(ParseError::InvalidHtml {
      message: "document produced no root node".to_string(),
      line: 0,
    })
  })
}

fn convert_handle_to_node(handle: &Handle) -> Option<DomNode> {
  let node_type = match &handle.data {
    NodeData::Document => DomNodeType::Document,
    NodeData::Element { name, attrs, .. } => {
      let namespace = if name.ns.as_ref() == HTML_NAMESPACE {
        String::new()
      } else {
        name.ns.to_string()
      };
      let attrs_ref = attrs.borrow();
      let mut attributes = Vec::with_capacity(attrs_ref.len());
      for attr in attrs_ref.iter() {
        attributes.push((attr.name.local.to_string(), attr.value.to_string()));
      }
      DomNodeType::Element {
        tag_name: name.local.to_string(),
        namespace,
        attributes,
      }
    }
    NodeData::Text { contents } => DomNodeType::Text {
      content: contents.borrow().to_string(),
    },
    _ => return None,
  };

  // Template contents live outside the regular child list in html5ever.
  let children = match &handle.data {
    NodeData::Element {
      name,
      template_contents,
      ..
    } if name.local.as_ref().eq_ignore_ascii_case("template") => {
      match &*template_contents.borrow() {
        Some(content) => content
          .children
          .borrow()
          .iter()
          .filter_map(convert_handle_to_node)
          .collect(),
        None => Vec::new(),
      }
    }
    _ => handle
      .children
      .borrow()
      .iter()
      .filter_map(convert_handle_to_node)
      .collect(),
  };

  Some(DomNode {
    node_type,
    children,
  })
}

impl DomNode {
  /// Build a detached HTML element with the given attributes and no children.
  pub fn element(tag_name: &str, attributes: Vec<(String, String)>) -> DomNode {
    DomNode {
      node_type: DomNodeType::Element {
        tag_name: tag_name.to_string(),
        namespace: String::new(),
        attributes,
      },
      children: Vec::new(),
    }
  }

  pub fn text(content: &str) -> DomNode {
    DomNode {
      node_type: DomNodeType::Text {
        content: content.to_string(),
      },
      children: Vec::new(),
    }
  }

  pub fn with_child(mut self, child: DomNode) -> DomNode {
    self.children.push(child);
    self
  }

  pub fn get_attribute_ref(&self, name: &str) -> Option<&str> {
    match &self.node_type {
      DomNodeType::Element { attributes, .. } => attributes
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str()),
      _ => None,
    }
  }

  pub fn get_attribute(&self, name: &str) -> Option<String> {
    self.get_attribute_ref(name).map(|v| v.to_string())
  }

  /// Set or overwrite an attribute. No-op on non-element nodes.
  pub fn set_attribute(&mut self, name: &str, value: &str) {
    if let DomNodeType::Element { attributes, .. } = &mut self.node_type {
      match attributes
        .iter_mut()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
      {
        Some((_, v)) => *v = value.to_string(),
        None => attributes.push((name.to_string(), value.to_string())),
      }
    }
  }

  pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
    if let DomNodeType::Element { attributes, .. } = &mut self.node_type {
      let idx = attributes
        .iter()
        .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
      return Some(attributes.remove(idx).1);
    }
    None
  }

  pub fn tag_name(&self) -> Option<&str> {
    match &self.node_type {
      DomNodeType::Element { tag_name, .. } => Some(tag_name),
      _ => None,
    }
  }

  /// Case-insensitive tag comparison.
  pub fn is_tag(&self, name: &str) -> bool {
    self
      .tag_name()
      .is_some_and(|tag| tag.eq_ignore_ascii_case(name))
  }

  pub fn attributes_iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
    let attrs: &[(String, String)] = match &self.node_type {
      DomNodeType::Element { attributes, .. } => attributes,
      _ => &[],
    };
    attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn is_element(&self) -> bool {
    matches!(self.node_type, DomNodeType::Element { .. })
  }

  pub fn is_text(&self) -> bool {
    matches!(self.node_type, DomNodeType::Text { .. })
  }

  pub fn text_content(&self) -> Option<&str> {
    match &self.node_type {
      DomNodeType::Text { content } => Some(content),
      _ => None,
    }
  }

  /// Concatenated text of this node and all of its descendants.
  pub fn collect_text(&self) -> String {
    let mut out = String::new();
    self.walk_tree(&mut |node| {
      if let Some(text) = node.text_content() {
        out.push_str(text);
      }
    });
    out
  }

  /// Visit this node and its descendants in document order. Visited nodes borrow from `self`.
  pub fn walk_tree<'a, F>(&'a self, f: &mut F)
  where
    F: FnMut(&'a DomNode),
  {
    f(self);
    for child in &self.children {
      child.walk_tree(f);
    }
  }

  /// Get element children (skip text nodes)
  pub fn element_children(&self) -> Vec<&DomNode> {
    self.children.iter().filter(|c| c.is_element()).collect()
  }

  /// Check if this element has a specific class
  pub fn has_class(&self, class: &str) -> bool {
    if let Some(class_attr) = self.get_attribute_ref("class") {
      class_attr.split_ascii_whitespace().any(|c| c == class)
    } else {
      false
    }
  }

  pub fn add_class(&mut self, class: &str) {
    if !self.is_element() || self.has_class(class) {
      return;
    }
    let value = match self.get_attribute_ref("class").map(str::trim) {
      Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
      _ => class.to_string(),
    };
    self.set_attribute("class", &value);
  }

  pub fn has_id(&self, id: &str) -> bool {
    self.get_attribute_ref("id") == Some(id)
  }

  pub fn node_at(&self, path: &[usize]) -> Option<&DomNode> {
    path
      .iter()
      .try_fold(self, |node, &idx| node.children.get(idx))
  }

  pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut DomNode> {
    path
      .iter()
      .try_fold(self, |node, &idx| node.children.get_mut(idx))
  }

  /// Nodes on the way from this root down to (excluding) the node at `path`.
  pub fn ancestors_of(&self, path: &[usize]) -> Vec<&DomNode> {
    let mut out = Vec::with_capacity(path.len());
    let mut node = self;
    for &idx in path {
      out.push(node);
      match node.children.get(idx) {
        Some(child) => node = child,
        None => break,
      }
    }
    out
  }

  /// Swap the node at `path` for `replacement`, returning the detached original.
  pub fn replace_at(&mut self, path: &[usize], replacement: DomNode) -> Option<DomNode> {
    let slot = self.node_at_mut(path)?;
    Some(std::mem::replace(slot, replacement))
  }

  /// Paths of every node matching `predicate`, in document order.
  pub fn collect_paths<F>(&self, mut predicate: F) -> Vec<NodePath>
  where
    F: FnMut(&DomNode) -> bool,
  {
    fn visit<F: FnMut(&DomNode) -> bool>(
      node: &DomNode,
      path: &mut NodePath,
      predicate: &mut F,
      out: &mut Vec<NodePath>,
    ) {
      if predicate(node) {
        out.push(path.clone());
      }
      for (idx, child) in node.children.iter().enumerate() {
        path.push(idx);
        visit(child, path, predicate, out);
        path.pop();
      }
    }

    let mut out = Vec::new();
    visit(self, &mut Vec::new(), &mut predicate, &mut out);
    out
  }

  pub fn find_first(&self, tag: &str) -> Option<&DomNode> {
    if self.is_tag(tag) {
      return Some(self);
    }
    self.children.iter().find_map(|child| child.find_first(tag))
  }

  pub fn find_all(&self, tag: &str) -> Vec<&DomNode> {
    let mut out = Vec::new();
    self.walk_tree(&mut |node| {
      if node.is_tag(tag) {
        out.push(node);
      }
    });
    out
  }

  /// Serialize this node (and its subtree) back to HTML.
  pub fn to_html(&self) -> String {
    let mut out = String::new();
    serialize_node(self, false, &mut out);
    out
  }

  /// Serialize only the children of this node.
  pub fn inner_html(&self) -> String {
    let raw = self
      .tag_name()
      .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
    let mut out = String::new();
    for child in &self.children {
      serialize_node(child, raw, &mut out);
    }
    out
  }
}

fn serialize_node(node: &DomNode, raw_text: bool, out: &mut String) {
  match &node.node_type {
    DomNodeType::Document => {
      out.push_str("<!DOCTYPE html>");
      for child in &node.children {
        serialize_node(child, false, out);
      }
    }
    DomNodeType::Text { content } => {
      if raw_text {
        out.push_str(content);
      } else {
        escape_into(content, false, out);
      }
    }
    DomNodeType::Element {
      tag_name,
      attributes,
      ..
    } => {
      out.push('<');
      out.push_str(tag_name);
      for (name, value) in attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
      }
      out.push('>');
      let lower = tag_name.to_ascii_lowercase();
      if VOID_ELEMENTS.contains(&lower.as_str()) {
        return;
      }
      let raw = RAW_TEXT_ELEMENTS.contains(&lower.as_str());
      for child in &node.children {
        serialize_node(child, raw, out);
      }
      out.push_str("</");
      out.push_str(tag_name);
      out.push('>');
    }
  }
}

fn escape_into(value: &str, attribute: bool, out: &mut String) {
  for ch in value.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '\u{a0}' => out.push_str("&nbsp;"),
      '"' if attribute => out.push_str("&quot;"),
      '<' if !attribute => out.push_str("&lt;"),
      '>' if !attribute => out.push_str("&gt;"),
      _ => out.push(ch),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn body(dom: &DomNode) -> &DomNode {
    dom.find_first("body").expect("body element")
  }

  #[test]
  fn parse_html_builds_element_tree() {
    let dom = parse_html("<p class=\"a b\">hi <a href=\"/x\">there</a></p>").expect("parse");
    let p = body(&dom).find_first("p").expect("p");
    assert!(p.has_class("a"));
    assert!(p.has_class("b"));
    assert_eq!(p.collect_text(), "hi there");
    assert_eq!(
      p.find_first("a").and_then(|a| a.get_attribute_ref("href")),
      Some("/x")
    );
  }

  #[test]
  fn walk_tree_yields_nodes_borrowed_from_the_tree() {
    let dom = parse_html("<p><a href=\"/1\">x</a></p><p><a href=\"/2\">y</a></p>").expect("parse");
    let mut links: Vec<&DomNode> = Vec::new();
    dom.walk_tree(&mut |node| {
      if node.is_tag("a") {
        links.push(node);
      }
    });
    let hrefs: Vec<_> = links.iter().filter_map(|a| a.get_attribute_ref("href")).collect();
    assert_eq!(hrefs, vec!["/1", "/2"]);
    assert_eq!(dom.find_all("a").len(), 2);
  }

  #[test]
  fn collect_paths_is_document_order_and_addressable() {
    let dom = parse_html("<div><img src=a.png><p><img src=b.png></p></div><img src=c.png>")
      .expect("parse");
    let paths = dom.collect_paths(|n| n.is_tag("img"));
    let srcs: Vec<_> = paths
      .iter()
      .map(|p| dom.node_at(p).and_then(|n| n.get_attribute_ref("src")))
      .collect();
    assert_eq!(srcs, vec![Some("a.png"), Some("b.png"), Some("c.png")]);

    let ancestors = dom.ancestors_of(&paths[1]);
    assert!(ancestors.iter().any(|n| n.is_tag("p")));
    assert!(!ancestors.iter().any(|n| n.is_tag("img")));
  }

  #[test]
  fn replace_at_swaps_subtree_in_place() {
    let mut dom = parse_html("<span>a</span><span>b</span>").expect("parse");
    let paths = dom.collect_paths(|n| n.is_tag("span"));
    let old = dom
      .replace_at(&paths[0], DomNode::element("em", Vec::new()))
      .expect("replaced");
    assert_eq!(old.collect_text(), "a");
    assert!(dom.node_at(&paths[0]).is_some_and(|n| n.is_tag("em")));
    assert!(dom.node_at(&paths[1]).is_some_and(|n| n.is_tag("span")));
  }

  #[test]
  fn attribute_and_class_mutation() {
    let mut node = DomNode::element("img", vec![("src".into(), "a.png".into())]);
    node.set_attribute("SRC", "b.png");
    node.set_attribute("alt", "x");
    node.add_class("smartcrop");
    node.add_class("smartcrop");
    assert_eq!(node.get_attribute_ref("src"), Some("b.png"));
    assert_eq!(node.get_attribute_ref("class"), Some("smartcrop"));
    assert_eq!(node.remove_attribute("alt").as_deref(), Some("x"));
    assert!(node.get_attribute_ref("alt").is_none());
  }

  #[test]
  fn serializes_void_elements_and_escapes() {
    let picture = DomNode::element("picture", Vec::new())
      .with_child(DomNode::element(
        "source",
        vec![("srcset".into(), "a.webp?x=1&y=\"2\"".into())],
      ))
      .with_child(DomNode::element("img", vec![("alt".into(), "<cat>".into())]));
    assert_eq!(
      picture.to_html(),
      "<picture><source srcset=\"a.webp?x=1&amp;y=&quot;2&quot;\"><img alt=\"<cat>\"></picture>"
    );
    assert_eq!(DomNode::text("a<b").to_html(), "a&lt;b");
  }
}

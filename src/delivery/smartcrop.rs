//! Smart-crop eligibility marking.
//!
//! Runs before classification. Eligible nodes are recorded in a [`StatusTable`] keyed by node
//! path instead of being tagged in the markup.

use super::classify::source_attribute;
use super::Decorator;
use crate::blocks::read_block_config;
use crate::dom::{DomNode, NodePath};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Class opting a single link or image into smart crops.
pub const SMARTCROP_CLASS: &str = "smartcrop";

const SECTION_CLASS: &str = "section";
const SECTION_METADATA_CLASS: &str = "section-metadata";

/// Delivery URLs addressing an asset by identifier rather than by path.
pub fn is_structured_asset_url(url: &str) -> bool {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN
    .get_or_init(|| {
      Regex::new(r"/adobe/assets/urn:aaid:aem:[0-9A-Za-z-]+").expect("structured asset pattern")
    })
    .is_match(url)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmartCropStatus {
  /// Eligible; the smart-crop picture has not been inserted yet.
  Loading,
  /// Replaced by a smart-crop picture.
  Loaded,
}

/// Smart-crop status per node path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTable {
  entries: HashMap<NodePath, SmartCropStatus>,
}

impl StatusTable {
  pub fn get(&self, path: &[usize]) -> Option<SmartCropStatus> {
    self.entries.get(path).copied()
  }

  pub fn set(&mut self, path: NodePath, status: SmartCropStatus) {
    self.entries.insert(path, status);
  }

  pub fn is_loading(&self, path: &[usize]) -> bool {
    self.get(path) == Some(SmartCropStatus::Loading)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn count(&self, status: SmartCropStatus) -> usize {
    self.entries.values().filter(|s| **s == status).count()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&NodePath, SmartCropStatus)> + '_ {
    self.entries.iter().map(|(path, status)| (path, *status))
  }
}

/// Whether a section's metadata block carries a `smartcrop` row.
pub fn section_opts_in(section: &DomNode) -> bool {
  let mut found = false;
  section.walk_tree(&mut |node| {
    if !found && node.has_class(SECTION_METADATA_CLASS) {
      found = read_block_config(node).contains_key("smartcrop");
    }
  });
  found
}

struct MarkState {
  page_level: bool,
  path: NodePath,
  table: StatusTable,
}

impl Decorator<'_> {
  /// Flag smart-crop candidates in `subtree` whose URL is a structured asset URL.
  ///
  /// No-op without configured smart crops. With the page-level `smartcrop` flag every link and
  /// standalone image is a candidate; otherwise only those carrying the `smartcrop` class or
  /// living in a section whose metadata opts in. A subtree detached from an opted-in section
  /// (see [`Decorator::in_smartcrop_section`]) is treated as living in it.
  pub fn mark_smartcrop_candidates(&self, subtree: &DomNode) -> StatusTable {
    if !self.config().has_smart_crops() {
      return StatusTable::default();
    }
    let mut state = MarkState {
      page_level: self.page().smartcrop,
      path: Vec::new(),
      table: StatusTable::default(),
    };
    self.mark_node(subtree, false, self.in_smartcrop_section, false, &mut state);
    state.table
  }

  fn mark_node(
    &self,
    node: &DomNode,
    is_section: bool,
    in_smartcrop_section: bool,
    inside_picture: bool,
    state: &mut MarkState,
  ) {
    let is_section = is_section || node.has_class(SECTION_CLASS);
    let in_smartcrop_section = in_smartcrop_section || (is_section && section_opts_in(node));

    let linkish = node.is_tag("a") || (node.is_tag("img") && !inside_picture);
    if linkish && (state.page_level || in_smartcrop_section || node.has_class(SMARTCROP_CLASS)) {
      let structured = source_attribute(node)
        .and_then(|href| self.page().resolve(href))
        .is_some_and(|url| is_structured_asset_url(url.as_str()));
      if structured {
        state
          .table
          .set(state.path.clone(), SmartCropStatus::Loading);
      }
    }

    let inside_picture = inside_picture || node.is_tag("picture");
    let is_main = node.is_tag("main");
    for (idx, child) in node.children.iter().enumerate() {
      state.path.push(idx);
      // Top-level divs of <main> are sections even before they are decorated as such.
      let child_is_section = is_main && child.is_tag("div");
      self.mark_node(
        child,
        child_is_section,
        in_smartcrop_section,
        inside_picture,
        state,
      );
      state.path.pop();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{DeliveryConfig, PageContext, SmartCropRange};
  use crate::dom::parse_html;
  use url::Url;

  const ASSET: &str = "https://x.example/adobe/assets/urn:aaid:aem:1234-abcd/as/cat.jpg";

  fn config() -> DeliveryConfig {
    DeliveryConfig::default().with_smart_crop(
      "Small",
      SmartCropRange {
        min_width: 0,
        max_width: Some(599),
      },
    )
  }

  fn page(smartcrop: bool) -> PageContext {
    PageContext::new(Url::parse("https://site.example/").expect("url")).with_smartcrop(smartcrop)
  }

  fn marked_srcs(dom: &DomNode, table: &StatusTable) -> Vec<String> {
    let mut out: Vec<String> = table
      .iter()
      .filter_map(|(path, _)| dom.node_at(path))
      .filter_map(|node| source_attribute(node).map(str::to_string))
      .collect();
    out.sort();
    out
  }

  #[test]
  fn recognizes_structured_asset_urls() {
    assert!(is_structured_asset_url(ASSET));
    assert!(is_structured_asset_url("https://x/adobe/assets/urn:aaid:aem:1"));
    assert!(!is_structured_asset_url("https://x.example/content/dam/cat.jpg"));
  }

  #[test]
  fn no_config_marks_nothing() {
    let dom = parse_html(&format!("<a class=smartcrop href=\"{ASSET}\">x</a>")).expect("parse");
    let config = DeliveryConfig::default();
    let page = page(true);
    assert!(Decorator::new(&config, &page)
      .mark_smartcrop_candidates(&dom)
      .is_empty());
  }

  #[test]
  fn page_level_flag_marks_every_structured_link_and_standalone_image() {
    let html = format!(
      "<a href=\"{ASSET}\">a</a><img src=\"{ASSET}?i=1\"><picture><img src=\"{ASSET}?i=2\"></picture><a href=\"https://x.example/plain.jpg\">p</a>"
    );
    let dom = parse_html(&html).expect("parse");
    let config = config();
    let page = page(true);
    let table = Decorator::new(&config, &page).mark_smartcrop_candidates(&dom);
    assert_eq!(
      marked_srcs(&dom, &table),
      vec![ASSET.to_string(), format!("{ASSET}?i=1")]
    );
    assert_eq!(table.count(SmartCropStatus::Loading), 2);
  }

  #[test]
  fn default_mode_uses_class_and_section_metadata() {
    let html = format!(
      "<main>\
        <div><a href=\"{ASSET}?s=1\">a</a><a class=\"smartcrop\" href=\"{ASSET}?s=2\">b</a></div>\
        <div><img src=\"{ASSET}?s=3\">\
          <div class=\"section-metadata\"><div><div>SmartCrop</div><div>true</div></div></div>\
        </div>\
      </main>"
    );
    let dom = parse_html(&html).expect("parse");
    let config = config();
    let page = page(false);
    let table = Decorator::new(&config, &page).mark_smartcrop_candidates(&dom);
    assert_eq!(
      marked_srcs(&dom, &table),
      vec![format!("{ASSET}?s=2"), format!("{ASSET}?s=3")]
    );
  }

  #[test]
  fn detached_subtree_inherits_section_opt_in() {
    let dom = parse_html(&format!(
      "<div class=\"hero\"><a href=\"{ASSET}\">a</a><img src=\"{ASSET}?i=1\"></div>"
    ))
    .expect("parse");
    let config = config();
    let page = page(false);
    let decorator = Decorator::new(&config, &page);
    assert!(decorator.mark_smartcrop_candidates(&dom).is_empty());
    let table = decorator
      .in_smartcrop_section(true)
      .mark_smartcrop_candidates(&dom);
    assert_eq!(table.count(SmartCropStatus::Loading), 2);
  }
}

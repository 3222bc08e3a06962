//! Page blocks: self-contained widgets with their own stylesheet and script module.
//!
//! Blocks are discovered as the `div`s of a section (a top-level `div` of `<main>`), named by
//! their first class. Each [`Block`] owns a copy of its markup; [`write_back`] puts decorated
//! markup back into the document.

pub mod loader;
pub mod registry;

use crate::config::DeliveryConfig;
use crate::delivery::smartcrop::section_opts_in;
use crate::dom::{DomNode, NodePath};
use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use loader::BlockLoader;
pub use registry::{BlockModule, ModuleRegistry};

/// Normalize arbitrary text into a CSS class / block name (`"Hero Banner!"` → `"hero-banner"`).
pub fn to_class_name(name: &str) -> String {
  let mut out = String::with_capacity(name.len());
  for ch in name.chars() {
    if ch.is_ascii_alphanumeric() {
      out.push(ch.to_ascii_lowercase());
    } else if !out.ends_with('-') {
      out.push('-');
    }
  }
  out.trim_matches('-').to_string()
}

/// Read a two-column key/value block (rows of `<div><div>key</div><div>value</div></div>`).
///
/// Keys are normalized with [`to_class_name`]. Values are the link targets when the cell holds
/// links (joined with `", "`), the image source when it holds an image, and the trimmed text
/// otherwise.
pub fn read_block_config(block: &DomNode) -> IndexMap<String, String> {
  let mut config = IndexMap::new();
  for row in block.element_children() {
    let cols = row.element_children();
    if cols.len() < 2 {
      continue;
    }
    let name = to_class_name(&cols[0].collect_text());
    if name.is_empty() {
      continue;
    }
    let links: Vec<&str> = cols[1]
      .find_all("a")
      .into_iter()
      .filter_map(|a| a.get_attribute_ref("href"))
      .collect();
    let value = if !links.is_empty() {
      links.join(", ")
    } else if let Some(src) = cols[1]
      .find_first("img")
      .and_then(|img| img.get_attribute_ref("src"))
    {
      src.to_string()
    } else {
      cols[1].collect_text().trim().to_string()
    };
    config.insert(name, value);
  }
  config
}

pub type BlockId = u64;

/// Loading state of a block. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum BlockStatus {
  #[default]
  Unloaded,
  Loading,
  Loaded,
}

impl BlockStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      BlockStatus::Unloaded => "unloaded",
      BlockStatus::Loading => "loading",
      BlockStatus::Loaded => "loaded",
    }
  }
}

static NEXT_BLOCK_ID: AtomicU64 = AtomicU64::new(1);

/// A loadable page widget.
#[derive(Debug)]
pub struct Block {
  id: BlockId,
  name: String,
  markup: Mutex<DomNode>,
  source_path: Option<NodePath>,
  smartcrop_section: bool,
}

impl Block {
  pub fn new(name: impl Into<String>, markup: DomNode) -> Self {
    Self {
      id: NEXT_BLOCK_ID.fetch_add(1, Ordering::Relaxed),
      name: name.into(),
      markup: Mutex::new(markup),
      source_path: None,
      smartcrop_section: false,
    }
  }

  /// Mark the block as coming from a section whose metadata opts into smart crops.
  pub fn with_smartcrop_section(mut self, opted_in: bool) -> Self {
    self.smartcrop_section = opted_in;
    self
  }

  pub fn in_smartcrop_section(&self) -> bool {
    self.smartcrop_section
  }

  /// Remember where in the document the markup came from, for [`write_back`].
  pub fn with_source_path(mut self, path: NodePath) -> Self {
    self.source_path = Some(path);
    self
  }

  pub fn id(&self) -> BlockId {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn source_path(&self) -> Option<&[usize]> {
    self.source_path.as_deref()
  }

  /// Lock the block markup. Do not hold the guard across an await point.
  pub fn markup(&self) -> MutexGuard<'_, DomNode> {
    self.markup.lock()
  }

  pub fn to_html(&self) -> String {
    self.markup.lock().to_html()
  }
}

/// Discover the blocks of `document`.
///
/// Only names listed in `config.blocks` are returned unless that list is empty. Discovered
/// markup is tagged with the `block` class and a `data-block-name` attribute.
pub fn collect_blocks(document: &DomNode, config: &DeliveryConfig) -> Vec<Arc<Block>> {
  let mut blocks = Vec::new();
  let mains = document.collect_paths(|node| node.is_tag("main"));
  for main_path in mains {
    let Some(main) = document.node_at(&main_path) else {
      continue;
    };
    for (section_idx, section) in main.children.iter().enumerate() {
      if !section.is_tag("div") {
        continue;
      }
      let smartcrop_section = section_opts_in(section);
      for (block_idx, candidate) in section.children.iter().enumerate() {
        if !candidate.is_tag("div") {
          continue;
        }
        let Some(name) = candidate
          .get_attribute_ref("class")
          .and_then(|class| class.split_ascii_whitespace().next())
          .map(to_class_name)
        else {
          continue;
        };
        if name.is_empty() || name == "section-metadata" {
          continue;
        }
        if !config.blocks.is_empty() && !config.blocks.iter().any(|b| *b == name) {
          continue;
        }

        let mut markup = candidate.clone();
        markup.add_class("block");
        markup.set_attribute("data-block-name", &name);
        let mut path = main_path.clone();
        path.extend([section_idx, block_idx]);
        blocks.push(Arc::new(
          Block::new(name, markup)
            .with_source_path(path)
            .with_smartcrop_section(smartcrop_section),
        ));
      }
    }
  }
  blocks
}

/// Copy each block's current markup back into `document` at its source path.
pub fn write_back(document: &mut DomNode, blocks: &[Arc<Block>]) -> usize {
  let mut written = 0;
  for block in blocks {
    let Some(path) = block.source_path() else {
      continue;
    };
    let markup = block.markup().clone();
    if document.replace_at(path, markup).is_some() {
      written += 1;
    }
  }
  written
}

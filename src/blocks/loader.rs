//! Block loading.
//!
//! A block moves `Unloaded → Loading → Loaded` exactly once. The status map is flipped to
//! `Loading` before the first await, so a second `load_block` racing the first returns
//! immediately instead of decorating twice or running the script module again.

use super::registry::ModuleRegistry;
use super::{collect_blocks, write_back, Block, BlockId, BlockStatus};
use crate::config::{DeliveryConfig, PageContext};
use crate::delivery::{Decorator, EXTERNAL_IMAGE_MARKER};
use crate::dom::DomNode;
use crate::error::{BlockError, Error, Result};
use crate::resource::{StylesheetLoader, StylesheetRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct BlockLoader {
  config: Arc<DeliveryConfig>,
  page: Arc<PageContext>,
  modules: ModuleRegistry,
  styles: Arc<dyn StylesheetLoader>,
  linked: StylesheetRegistry,
  status: Mutex<HashMap<BlockId, BlockStatus>>,
  marker: String,
}

impl fmt::Debug for BlockLoader {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BlockLoader")
      .field("code_base_path", &self.config.code_base_path)
      .field("modules", &self.modules)
      .field("linked", &self.linked)
      .field("marker", &self.marker)
      .finish_non_exhaustive()
  }
}

impl BlockLoader {
  pub fn new(
    config: Arc<DeliveryConfig>,
    page: Arc<PageContext>,
    modules: ModuleRegistry,
    styles: Arc<dyn StylesheetLoader>,
  ) -> Self {
    Self {
      config,
      page,
      modules,
      styles,
      linked: StylesheetRegistry::new(),
      status: Mutex::new(HashMap::new()),
      marker: EXTERNAL_IMAGE_MARKER.to_string(),
    }
  }

  /// Stylesheets already present on the page; they are never loaded again.
  pub fn with_linked_stylesheets(mut self, linked: StylesheetRegistry) -> Self {
    self.linked = linked;
    self
  }

  /// Link text marking placeholder links for external images.
  pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
    self.marker = marker.into();
    self
  }

  pub fn config(&self) -> &DeliveryConfig {
    &self.config
  }

  pub fn status(&self, block: &Block) -> BlockStatus {
    self
      .status
      .lock()
      .get(&block.id())
      .copied()
      .unwrap_or_default()
  }

  pub fn stylesheet_href(&self, name: &str) -> String {
    format!("{}/blocks/{name}/{name}.css", self.config.code_base_path)
  }

  pub fn script_path(&self, name: &str) -> String {
    format!("{}/blocks/{name}/{name}.js", self.config.code_base_path)
  }

  /// Claim the block for loading. False when another load already claimed it.
  fn begin_load(&self, block: &Block) -> bool {
    let mut status = self.status.lock();
    let entry = status.entry(block.id()).or_default();
    if *entry != BlockStatus::Unloaded {
      return false;
    }
    *entry = BlockStatus::Loading;
    true
  }

  fn finish_load(&self, block: &Block) {
    self.status.lock().insert(block.id(), BlockStatus::Loaded);
  }

  fn decorate(&self, block: &Block) {
    let decorator =
      Decorator::new(&self.config, &self.page).in_smartcrop_section(block.in_smartcrop_section());
    let mut markup = block.markup();
    let report = decorator.decorate_external_images(&mut markup, &self.marker);
    let from_alt = decorator.decorate_images_from_alt(&mut markup);
    debug!(
      block = block.name(),
      external = report.replaced,
      from_alt,
      "decorated block images"
    );
  }

  async fn load_stylesheet(&self, name: &str) -> Result<()> {
    let href = self.stylesheet_href(name);
    if !self.linked.link(&href) {
      debug!(href = %href, "stylesheet already linked");
      return Ok(());
    }
    self.styles.load(&href).await
  }

  async fn run_module(&self, block: &Block) -> Result<()> {
    let module = self
      .modules
      .get(block.name(), &self.script_path(block.name()))?;
    if !module.has_default_export() {
      return Ok(());
    }
    module.run(block).await.map_err(|err| match err {
      Error::Block(_) => err,
      other => BlockError::ModuleFailed {
        name: block.name().to_string(),
        message: other.to_string(),
      }
      .into(),
    })
  }

  /// Load a block: decorate its images, then load its stylesheet and run its script module
  /// concurrently. Failures are logged; the block ends up `Loaded` either way.
  pub async fn load_block(&self, block: Arc<Block>) -> Arc<Block> {
    if !self.begin_load(&block) {
      debug!(block = block.name(), "block already loading or loaded");
      return block;
    }
    info!(block = block.name(), "loading block");

    self.decorate(&block);

    let (stylesheet, script) = futures::join!(
      self.load_stylesheet(block.name()),
      self.run_module(&block)
    );
    if let Err(err) = stylesheet {
      warn!(block = block.name(), error = %err, "failed to load block stylesheet");
    }
    if let Err(err) = script {
      warn!(block = block.name(), error = %err, "failed to load block");
    }

    self.finish_load(&block);
    info!(block = block.name(), "block loaded");
    block
  }

  /// Load blocks one after another, in the given order.
  pub async fn load_blocks(&self, blocks: &[Arc<Block>]) -> Vec<Arc<Block>> {
    let mut loaded = Vec::with_capacity(blocks.len());
    for block in blocks {
      loaded.push(self.load_block(Arc::clone(block)).await);
    }
    loaded
  }

  /// Discover the blocks of `document`, load them and write the decorated markup back.
  pub async fn load_document(&self, document: &mut DomNode) -> Vec<Arc<Block>> {
    let blocks = collect_blocks(document, &self.config);
    let loaded = self.load_blocks(&blocks).await;
    let written = write_back(document, &loaded);
    info!(blocks = loaded.len(), written, "page blocks loaded");
    loaded
  }
}

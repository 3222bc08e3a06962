//! Script modules for blocks, registered by block name at startup.

use super::Block;
use crate::error::{BlockError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The script side of a block.
#[async_trait]
pub trait BlockModule: Send + Sync {
  /// Whether the module exposes an entry point. Modules without one are resolved but not run.
  fn has_default_export(&self) -> bool {
    true
  }

  /// Decorate the block. The markup lock must not be held across an await.
  async fn run(&self, block: &Block) -> Result<()>;
}

/// Block name → script module.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
  modules: HashMap<String, Arc<dyn BlockModule>>,
}

impl fmt::Debug for ModuleRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names = self.names();
    names.sort_unstable();
    f.debug_struct("ModuleRegistry")
      .field("modules", &names)
      .finish()
  }
}

impl ModuleRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, name: impl Into<String>, module: Arc<dyn BlockModule>) {
    self.modules.insert(name.into(), module);
  }

  pub fn with(mut self, name: impl Into<String>, module: Arc<dyn BlockModule>) -> Self {
    self.register(name, module);
    self
  }

  /// Resolve the module for `name`; `path` is only used to report a missing module.
  pub fn get(&self, name: &str, path: &str) -> Result<Arc<dyn BlockModule>> {
    self.modules.get(name).cloned().ok_or_else(|| {
      BlockError::ModuleNotFound {
        name: name.to_string(),
        path: path.to_string(),
      }
      .into()
    })
  }

  pub fn contains(&self, name: &str) -> bool {
    self.modules.contains_key(name)
  }

  pub fn names(&self) -> Vec<&str> {
    self.modules.keys().map(String::as_str).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dom::DomNode;
  use crate::error::Error;

  struct Noop;

  #[async_trait]
  impl BlockModule for Noop {
    async fn run(&self, _block: &Block) -> Result<()> {
      Ok(())
    }
  }

  #[test]
  fn missing_module_reports_name_and_path() {
    let registry = ModuleRegistry::new().with("hero", Arc::new(Noop));
    assert!(registry.contains("hero"));
    assert!(registry.get("hero", "/blocks/hero/hero.js").is_ok());

    match registry.get("cards", "/blocks/cards/cards.js") {
      Err(Error::Block(BlockError::ModuleNotFound { name, path })) => {
        assert_eq!(name, "cards");
        assert_eq!(path, "/blocks/cards/cards.js");
      }
      other => panic!("expected ModuleNotFound, got {:?}", other.map(|_| ())),
    }
  }

  #[test]
  fn modules_run_against_a_block() {
    let block = Block::new("hero", DomNode::element("div", Vec::new()));
    let module = ModuleRegistry::new()
      .with("hero", Arc::new(Noop))
      .get("hero", "/blocks/hero/hero.js")
      .expect("module");
    assert!(module.has_default_export());
    assert!(futures::executor::block_on(module.run(&block)).is_ok());
  }
}

//! Resource fetching abstraction
//!
//! Block stylesheets are loaded through the [`StylesheetLoader`] trait so the library stays
//! agnostic about how resources are retrieved. [`FetchStylesheetLoader`] adapts any
//! [`ResourceFetcher`]; [`StaticFetcher`] serves an in-memory map, which is enough for
//! pre-bundled sites and for tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use fastpicture::resource::{FetchedResource, FetchStylesheetLoader, StaticFetcher};
//!
//! let fetcher = StaticFetcher::new()
//!     .with_resource("/blocks/hero/hero.css", FetchedResource::css(".hero{}"));
//! let loader = FetchStylesheetLoader::new(fetcher);
//! ```

use crate::dom::DomNode;
use crate::error::{ResourceError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Result of fetching a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
  /// Raw bytes of the resource
  pub bytes: Vec<u8>,
  /// Content-Type header value, if available (e.g., "text/css")
  pub content_type: Option<String>,
}

impl FetchedResource {
  /// Create a new FetchedResource
  pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
    Self { bytes, content_type }
  }

  /// A `text/css` resource
  pub fn css(text: &str) -> Self {
    Self::new(text.as_bytes().to_vec(), Some("text/css".to_string()))
  }

  /// Check if this resource appears to be CSS based on content-type
  pub fn is_css(&self) -> bool {
    self.content_type
      .as_ref()
      .map(|ct| ct.contains("text/css"))
      .unwrap_or(false)
  }
}

/// Trait for fetching external resources
///
/// Implementations must be thread-safe (Send + Sync) so one fetcher can serve every block.
pub trait ResourceFetcher: Send + Sync {
  /// Fetch a resource from the given URL or site-relative path
  fn fetch(&self, url: &str) -> Result<FetchedResource>;
}

// Allow Arc<dyn ResourceFetcher> to be used as ResourceFetcher
impl<T: ResourceFetcher + ?Sized> ResourceFetcher for Arc<T> {
  fn fetch(&self, url: &str) -> Result<FetchedResource> {
    (**self).fetch(url)
  }
}

/// Fetcher serving resources from an in-memory map
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
  resources: HashMap<String, FetchedResource>,
}

impl StaticFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_resource(mut self, url: impl Into<String>, resource: FetchedResource) -> Self {
    self.insert(url, resource);
    self
  }

  pub fn insert(&mut self, url: impl Into<String>, resource: FetchedResource) {
    self.resources.insert(url.into(), resource);
  }
}

impl ResourceFetcher for StaticFetcher {
  fn fetch(&self, url: &str) -> Result<FetchedResource> {
    self.resources.get(url).cloned().ok_or_else(|| {
      ResourceError::NotFound {
        url: url.to_string(),
      }
      .into()
    })
  }
}

/// Fetcher serving site-relative paths from a directory on disk
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
  root: PathBuf,
}

impl DirectoryFetcher {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn path_for(&self, url: &str) -> Option<PathBuf> {
    let relative = url.split(['?', '#']).next().unwrap_or_default();
    let mut path = self.root.clone();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
      if segment == ".." {
        return None;
      }
      path.push(segment);
    }
    Some(path)
  }
}

impl ResourceFetcher for DirectoryFetcher {
  fn fetch(&self, url: &str) -> Result<FetchedResource> {
    let path = self.path_for(url).ok_or_else(|| ResourceError::NotFound {
      url: url.to_string(),
    })?;
    let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
      std::io::ErrorKind::NotFound => ResourceError::NotFound {
        url: url.to_string(),
      },
      _ => ResourceError::FetchFailed {
        url: url.to_string(),
        reason: e.to_string(),
      },
    })?;
    let content_type = match path.extension().and_then(|e| e.to_str()) {
      Some("css") => Some("text/css".to_string()),
      Some("js") => Some("text/javascript".to_string()),
      Some("html") => Some("text/html".to_string()),
      _ => None,
    };
    Ok(FetchedResource::new(bytes, content_type))
  }
}

/// Loads a block stylesheet into the page
#[async_trait]
pub trait StylesheetLoader: Send + Sync {
  async fn load(&self, href: &str) -> Result<()>;
}

/// Stylesheet loader backed by a [`ResourceFetcher`]
///
/// A load succeeds when the fetch succeeds and the response is CSS (or carries no content
/// type at all).
#[derive(Debug, Clone)]
pub struct FetchStylesheetLoader<F> {
  fetcher: F,
}

impl<F: ResourceFetcher> FetchStylesheetLoader<F> {
  pub fn new(fetcher: F) -> Self {
    Self { fetcher }
  }
}

#[async_trait]
impl<F: ResourceFetcher> StylesheetLoader for FetchStylesheetLoader<F> {
  async fn load(&self, href: &str) -> Result<()> {
    let resource = self.fetcher.fetch(href)?;
    match resource.content_type.as_deref() {
      Some(content_type) if !resource.is_css() => Err(ResourceError::UnexpectedContentType {
        url: href.to_string(),
        content_type: content_type.to_string(),
      }
      .into()),
      _ => Ok(()),
    }
  }
}

/// Stylesheet hrefs already linked into the page
#[derive(Debug, Default)]
pub struct StylesheetRegistry {
  linked: Mutex<HashSet<String>>,
}

impl StylesheetRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed the registry from the `<link rel="stylesheet">` elements of a document
  pub fn from_document(document: &DomNode) -> Self {
    let linked = document
      .find_all("link")
      .into_iter()
      .filter(|link| {
        link
          .get_attribute_ref("rel")
          .is_some_and(|rel| {
            rel
              .split_ascii_whitespace()
              .any(|r| r.eq_ignore_ascii_case("stylesheet"))
          })
      })
      .filter_map(|link| link.get_attribute("href"))
      .collect();
    Self {
      linked: Mutex::new(linked),
    }
  }

  /// Record `href` as linked. Returns false when an identical link already exists.
  pub fn link(&self, href: &str) -> bool {
    self.linked.lock().insert(href.to_string())
  }

  pub fn contains(&self, href: &str) -> bool {
    self.linked.lock().contains(href)
  }

  pub fn len(&self) -> usize {
    self.linked.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.linked.lock().is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dom::parse_html;
  use crate::error::Error;

  fn block_on<F: std::future::Future>(future: F) -> F::Output {
    futures::executor::block_on(future)
  }

  #[test]
  fn static_fetcher_serves_known_urls() {
    let fetcher = StaticFetcher::new().with_resource("/a.css", FetchedResource::css("a{}"));
    assert!(fetcher.fetch("/a.css").expect("fetch").is_css());
    assert!(matches!(
      fetcher.fetch("/b.css"),
      Err(Error::Resource(ResourceError::NotFound { .. }))
    ));
  }

  #[test]
  fn fetch_loader_rejects_non_css() {
    let fetcher = StaticFetcher::new()
      .with_resource("/ok.css", FetchedResource::css("a{}"))
      .with_resource("/untyped.css", FetchedResource::new(b"a{}".to_vec(), None))
      .with_resource(
        "/page.css",
        FetchedResource::new(b"<html>".to_vec(), Some("text/html".to_string())),
      );
    let loader = FetchStylesheetLoader::new(Arc::new(fetcher));
    assert!(block_on(loader.load("/ok.css")).is_ok());
    assert!(block_on(loader.load("/untyped.css")).is_ok());
    assert!(matches!(
      block_on(loader.load("/page.css")),
      Err(Error::Resource(ResourceError::UnexpectedContentType { .. }))
    ));
    assert!(block_on(loader.load("/missing.css")).is_err());
  }

  #[test]
  fn directory_fetcher_reads_site_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("blocks/hero")).expect("mkdir");
    std::fs::write(dir.path().join("blocks/hero/hero.css"), ".hero{}").expect("write");

    let fetcher = DirectoryFetcher::new(dir.path());
    let css = fetcher.fetch("/blocks/hero/hero.css?v=1").expect("fetch");
    assert!(css.is_css());
    assert_eq!(css.bytes, b".hero{}");
    assert!(matches!(
      fetcher.fetch("/blocks/cards/cards.css"),
      Err(Error::Resource(ResourceError::NotFound { .. }))
    ));
    assert!(fetcher.fetch("/../secret.css").is_err());
  }

  #[test]
  fn registry_links_each_href_once() {
    let dom = parse_html(
      "<html><head><link rel=\"stylesheet\" href=\"/styles/styles.css\"><link rel=\"icon\" href=\"/favicon.ico\"></head></html>",
    )
    .expect("parse");
    let registry = StylesheetRegistry::from_document(&dom);
    assert_eq!(registry.len(), 1);
    assert!(!registry.link("/styles/styles.css"));
    assert!(registry.link("/blocks/hero/hero.css"));
    assert!(!registry.link("/blocks/hero/hero.css"));
    assert!(registry.contains("/blocks/hero/hero.css"));
  }
}

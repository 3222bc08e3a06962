//! Which `<img>`/`<a>` nodes reference externally delivered images.

use crate::config::{DeliveryConfig, DeliveryFormat, ExternalPrefix, PageContext};
use crate::dom::DomNode;

/// Image extensions the delivery service can transform.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "avif"];

/// How a classified node becomes a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PictureHandler {
  pub format: DeliveryFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
  NotExternal,
  External(PictureHandler),
}

impl Classification {
  pub fn is_external(&self) -> bool {
    matches!(self, Classification::External(_))
  }

  pub fn handler(&self) -> Option<PictureHandler> {
    match self {
      Classification::External(handler) => Some(*handler),
      Classification::NotExternal => None,
    }
  }
}

/// Lowercased extension of `url`, ignoring any fragment or query.
pub fn image_extension(url: &str) -> Option<String> {
  let end = url.find(|c: char| c == '#' || c == '?').unwrap_or(url.len());
  let trimmed = &url[..end];
  let (_, ext) = trimmed.rsplit_once('.')?;
  Some(ext.to_ascii_lowercase())
}

pub fn is_image_url(url: &str) -> bool {
  image_extension(url).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// First configured prefix `url` starts with.
pub fn matching_prefix<'c>(config: &'c DeliveryConfig, url: &str) -> Option<&'c ExternalPrefix> {
  config
    .external_image_url_prefixes
    .iter()
    .find(|entry| url.starts_with(entry.prefix.as_str()))
}

/// The URL a link or image points at: `href` for `<a>`, `src` for `<img>`.
pub fn source_attribute(node: &DomNode) -> Option<&str> {
  if node.is_tag("a") {
    node.get_attribute_ref("href")
  } else if node.is_tag("img") {
    node.get_attribute_ref("src")
  } else {
    None
  }
}

/// Classify `node`. `inside_picture` tells whether any ancestor is a `<picture>`.
///
/// Standalone images are external only when their `src`, resolved against the page, starts with
/// a configured prefix and names an image; links are external when their text is exactly
/// `marker` or their `href` names an image.
pub fn classify(
  config: &DeliveryConfig,
  page: &PageContext,
  node: &DomNode,
  inside_picture: bool,
  marker: &str,
) -> Classification {
  if node.is_tag("img") {
    if inside_picture {
      return Classification::NotExternal;
    }
    let Some(src) = node
      .get_attribute_ref("src")
      .and_then(|src| page.resolve(src))
    else {
      return Classification::NotExternal;
    };
    return match matching_prefix(config, src.as_str()) {
      Some(entry) if is_image_url(src.as_str()) => Classification::External(PictureHandler {
        format: entry.format,
      }),
      _ => Classification::NotExternal,
    };
  }

  if node.is_tag("a") {
    if node.collect_text().trim() == marker {
      return Classification::External(PictureHandler::default());
    }
    let href = node.get_attribute_ref("href").unwrap_or_default();
    if is_image_url(href) {
      return Classification::External(PictureHandler::default());
    }
  }

  Classification::NotExternal
}

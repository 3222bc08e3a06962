//! Pictures whose `<img alt>` carries an encoded delivery reference.
//!
//! Authoring tools that cannot emit delivery URLs directly store a percent-encoded JSON object
//! (`{"deliveryUrl": ..., "altText": ...}`) in the alt text of a placeholder picture. Any alt
//! that does not decode to such an object is ordinary alt text and is left alone.

use super::picture::default_breakpoints;
use super::smartcrop::is_structured_asset_url;
use super::Decorator;
use crate::config::DeliveryFormat;
use crate::dom::{DomNode, NodePath};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use tracing::debug;

/// Delivery reference decoded from an alt attribute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReference {
  pub delivery_url: String,
  #[serde(default)]
  pub alt_text: String,
}

/// Decode an alt attribute into a delivery reference, or `None` for ordinary alt text.
pub fn decode_alt_payload(alt: &str) -> Option<DeliveryReference> {
  let decoded = percent_decode_str(alt).decode_utf8().ok()?;
  let reference: DeliveryReference = serde_json::from_str(decoded.trim()).ok()?;
  if reference.delivery_url.trim().is_empty() {
    return None;
  }
  Some(reference)
}

impl Decorator<'_> {
  /// Replace every `<picture>` in `subtree` whose image alt decodes to a delivery reference.
  ///
  /// Structured asset URLs get smart-crop pictures, anything else a uniform `webp` picture over
  /// the default breakpoints. Returns the number of pictures replaced.
  pub fn decorate_images_from_alt(&self, subtree: &mut DomNode) -> usize {
    let pictures = subtree.collect_paths(|node| node.is_tag("picture"));
    let mut replaced_roots: Vec<NodePath> = Vec::new();

    for path in pictures {
      if replaced_roots.iter().any(|root| path.starts_with(root)) {
        continue;
      }
      let reference = subtree
        .node_at(&path)
        .and_then(|picture| picture.find_first("img"))
        .and_then(|img| img.get_attribute_ref("alt"))
        .and_then(decode_alt_payload);
      let Some(reference) = reference else {
        continue;
      };

      let synthesized = if is_structured_asset_url(&reference.delivery_url) {
        self.create_optimized_picture_with_smartcrop(
          &reference.delivery_url,
          &reference.alt_text,
          false,
          &[],
          DeliveryFormat::Webp,
        )
      } else {
        self.create_optimized_picture(
          &reference.delivery_url,
          &reference.alt_text,
          false,
          &default_breakpoints(),
          DeliveryFormat::Webp,
        )
      };
      match synthesized {
        Ok(picture) => {
          subtree.replace_at(&path, picture);
          replaced_roots.push(path);
        }
        Err(err) => {
          debug!(url = %reference.delivery_url, error = %err, "keeping placeholder picture");
        }
      }
    }

    replaced_roots.len()
  }
}

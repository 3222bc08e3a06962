use super::classify::{classify, source_attribute, Classification};
use super::picture::default_breakpoints;
use super::query::{append_query_params, query_params};
use super::smartcrop::{SmartCropStatus, StatusTable};
use super::Decorator;
use crate::dom::{DomNode, NodePath};
use tracing::debug;
use url::Url;

/// Outcome of one external-image decoration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationReport {
  /// Nodes replaced by a synthesized picture.
  pub replaced: usize,
  /// Smart-crop status per original node path, after the pass.
  pub smartcrop: StatusTable,
}

/// Copy every query parameter of `original` onto each `<source srcset>` and `<img src>` of
/// `picture`, through the allow-list.
fn propagate_query_params(picture: &mut DomNode, original: &Url) {
  let params = query_params(original);
  if params.is_empty() {
    return;
  }
  for child in picture.children.iter_mut() {
    let attr = if child.is_tag("source") {
      "srcset"
    } else if child.is_tag("img") {
      "src"
    } else {
      continue;
    };
    let Some(current) = child.get_attribute_ref(attr).and_then(|v| Url::parse(v).ok()) else {
      continue;
    };
    let updated = append_query_params(&current, params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    child.set_attribute(attr, updated.as_str());
  }
}

/// Alt text for the synthesized picture: the image's own alt, or the link text unless it is the
/// placeholder marker.
fn alt_text(node: &DomNode, marker: &str) -> String {
  if node.is_tag("img") {
    return node.get_attribute("alt").unwrap_or_default();
  }
  let text = node.collect_text();
  let text = text.trim();
  if text == marker {
    String::new()
  } else {
    text.to_string()
  }
}

impl Decorator<'_> {
  /// Replace every external image reference in `subtree` with a responsive picture.
  ///
  /// Each `<a>`/`<img>` is visited once, in document order, from a snapshot taken before any
  /// replacement. Nodes inside an already replaced subtree are skipped, and images nested in a
  /// `<picture>` are never external, so running the pass again is a no-op.
  pub fn decorate_external_images(&self, subtree: &mut DomNode, marker: &str) -> DecorationReport {
    let mut statuses = self.mark_smartcrop_candidates(subtree);
    let candidates = subtree.collect_paths(|node| node.is_tag("a") || node.is_tag("img"));
    let mut replaced_roots: Vec<NodePath> = Vec::new();
    let mut replaced = 0;

    for path in candidates {
      if replaced_roots.iter().any(|root| path.starts_with(root)) {
        continue;
      }
      let Some(node) = subtree.node_at(&path) else {
        continue;
      };
      let inside_picture = subtree
        .ancestors_of(&path)
        .iter()
        .any(|ancestor| ancestor.is_tag("picture"));
      let Classification::External(handler) =
        classify(self.config(), self.page(), node, inside_picture, marker)
      else {
        continue;
      };

      let Some(url) = source_attribute(node).and_then(|href| self.page().resolve(href)) else {
        debug!(path = ?path, "skipping external image without a resolvable URL");
        continue;
      };
      let alt = alt_text(node, marker);

      let smartcrop = statuses.is_loading(&path);
      let synthesized = if smartcrop {
        self.create_optimized_picture_with_smartcrop(url.as_str(), &alt, false, &[], handler.format)
      } else {
        self.create_optimized_picture(
          url.as_str(),
          &alt,
          false,
          &default_breakpoints(),
          handler.format,
        )
      };
      let mut picture = match synthesized {
        Ok(picture) => picture,
        Err(err) => {
          debug!(url = %url, error = %err, "skipping external image");
          continue;
        }
      };

      propagate_query_params(&mut picture, &url);
      subtree.replace_at(&path, picture);
      if smartcrop {
        statuses.set(path.clone(), SmartCropStatus::Loaded);
      }
      replaced_roots.push(path);
      replaced += 1;
    }

    DecorationReport {
      replaced,
      smartcrop: statuses,
    }
  }
}

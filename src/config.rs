//! Site and page configuration.
//!
//! [`DeliveryConfig`] is the site-wide, read-only configuration threaded through every
//! decoration and block-loading call. [`PageContext`] carries what is specific to the page being
//! decorated: its location (for resolving relative URLs) and the page-level smart-crop opt-in.

use crate::dom::DomNode;
use crate::error::{ConfigError, Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// Image format requested from the delivery service for type-negotiated `<source>` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryFormat {
  #[default]
  Webp,
  Avif,
  #[serde(alias = "jpg")]
  Jpeg,
  Png,
  Gif,
}

impl DeliveryFormat {
  pub fn as_str(self) -> &'static str {
    match self {
      DeliveryFormat::Webp => "webp",
      DeliveryFormat::Avif => "avif",
      DeliveryFormat::Jpeg => "jpeg",
      DeliveryFormat::Png => "png",
      DeliveryFormat::Gif => "gif",
    }
  }

  pub fn mime_type(self) -> &'static str {
    match self {
      DeliveryFormat::Webp => "image/webp",
      DeliveryFormat::Avif => "image/avif",
      DeliveryFormat::Jpeg => "image/jpeg",
      DeliveryFormat::Png => "image/png",
      DeliveryFormat::Gif => "image/gif",
    }
  }
}

impl fmt::Display for DeliveryFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DeliveryFormat {
  type Err = ConfigError;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "webp" => Ok(DeliveryFormat::Webp),
      "avif" => Ok(DeliveryFormat::Avif),
      "jpg" | "jpeg" => Ok(DeliveryFormat::Jpeg),
      "png" => Ok(DeliveryFormat::Png),
      "gif" => Ok(DeliveryFormat::Gif),
      _ => Err(ConfigError::UnknownFormat {
        format: s.to_string(),
      }),
    }
  }
}

/// A URL prefix identifying externally hosted images, paired with the format its pictures
/// negotiate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalPrefix {
  pub prefix: String,
  pub format: DeliveryFormat,
}

/// Viewport width range a named smart crop applies to, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartCropRange {
  pub min_width: u32,
  /// Open-ended when absent.
  #[serde(default)]
  pub max_width: Option<u32>,
}

impl SmartCropRange {
  /// Media condition selecting this crop.
  pub fn media_query(&self) -> String {
    match self.max_width {
      Some(max) => format!(
        "(min-width: {}px) and (max-width: {}px)",
        self.min_width, max
      ),
      None => format!("(min-width: {}px)", self.min_width),
    }
  }
}

/// Prefix entries as they appear in configuration files: either a bare prefix string (legacy,
/// negotiates the default format) or a `[prefix, format]` pair.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPrefixEntry {
  Legacy(String),
  Pair(String, String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeliveryConfig {
  #[serde(default)]
  external_image_url_prefixes: Vec<RawPrefixEntry>,
  #[serde(default)]
  smart_crops: Option<IndexMap<String, SmartCropRange>>,
  #[serde(default)]
  code_base_path: String,
  #[serde(default)]
  blocks: Vec<String>,
}

/// Site-wide delivery configuration.
///
/// Read-only for the duration of a decoration pass; share it behind an `Arc` when blocks are
/// loaded concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDeliveryConfig")]
pub struct DeliveryConfig {
  pub external_image_url_prefixes: Vec<ExternalPrefix>,
  /// Ordered: derived smart-crop breakpoints follow this order.
  pub smart_crops: IndexMap<String, SmartCropRange>,
  pub code_base_path: String,
  /// Block names eligible for loading. Empty means every block is eligible.
  pub blocks: Vec<String>,
}

impl TryFrom<RawDeliveryConfig> for DeliveryConfig {
  type Error = ConfigError;

  fn try_from(raw: RawDeliveryConfig) -> std::result::Result<Self, Self::Error> {
    let mut prefixes = Vec::with_capacity(raw.external_image_url_prefixes.len());
    for entry in raw.external_image_url_prefixes {
      let prefix = match entry {
        RawPrefixEntry::Legacy(prefix) => ExternalPrefix {
          prefix,
          format: DeliveryFormat::default(),
        },
        RawPrefixEntry::Pair(prefix, format) => ExternalPrefix {
          prefix,
          format: format.parse()?,
        },
      };
      if prefix.prefix.trim().is_empty() {
        return Err(ConfigError::InvalidPrefix {
          entry: prefix.prefix,
        });
      }
      prefixes.push(prefix);
    }

    let smart_crops = raw.smart_crops.unwrap_or_default();
    for (name, range) in &smart_crops {
      if let Some(max) = range.max_width {
        if max < range.min_width {
          return Err(ConfigError::InvalidSmartCrop {
            name: name.clone(),
            reason: format!("maxWidth {} is below minWidth {}", max, range.min_width),
          });
        }
      }
    }

    Ok(DeliveryConfig {
      external_image_url_prefixes: prefixes,
      smart_crops,
      code_base_path: raw.code_base_path.trim_end_matches('/').to_string(),
      blocks: raw.blocks,
    })
  }
}

impl DeliveryConfig {
  pub fn from_json_str(json: &str) -> Result<Self> {
    serde_json::from_str(json).map_err(Error::from)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let json = std::fs::read_to_string(path)?;
    Self::from_json_str(&json)
  }

  pub fn with_prefix(mut self, prefix: impl Into<String>, format: DeliveryFormat) -> Self {
    self.external_image_url_prefixes.push(ExternalPrefix {
      prefix: prefix.into(),
      format,
    });
    self
  }

  pub fn with_smart_crop(mut self, name: impl Into<String>, range: SmartCropRange) -> Self {
    self.smart_crops.insert(name.into(), range);
    self
  }

  pub fn with_code_base_path(mut self, path: impl Into<String>) -> Self {
    self.code_base_path = path.into().trim_end_matches('/').to_string();
    self
  }

  pub fn with_blocks<I, S>(mut self, blocks: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.blocks = blocks.into_iter().map(Into::into).collect();
    self
  }

  pub fn has_smart_crops(&self) -> bool {
    !self.smart_crops.is_empty()
  }
}

/// Page-level context for a decoration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
  /// Location relative image URLs resolve against.
  pub location: Url,
  /// Page opted into smart crops for every image (`<meta name="smartcrop" content="true">`).
  pub smartcrop: bool,
}

impl PageContext {
  pub fn new(location: Url) -> Self {
    Self {
      location,
      smartcrop: false,
    }
  }

  pub fn with_smartcrop(mut self, smartcrop: bool) -> Self {
    self.smartcrop = smartcrop;
    self
  }

  /// Read page-level flags from the document's `<meta>` elements.
  pub fn from_document(document: &DomNode, location: Url) -> Self {
    let smartcrop = get_metadata(document, "smartcrop")
      .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));
    Self {
      location,
      smartcrop,
    }
  }

  /// Resolve `href` against the page location.
  ///
  /// Empty, fragment-only and script/mail hrefs never resolve to an image.
  pub fn resolve(&self, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
      return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("mailto:") {
      return None;
    }
    self.location.join(href).ok()
  }
}

/// Value of a `<meta>` element, joined with `", "` when repeated.
///
/// Names containing `:` (Open Graph style) match the `property` attribute, others `name`.
pub fn get_metadata(document: &DomNode, name: &str) -> Option<String> {
  let attr = if name.contains(':') { "property" } else { "name" };
  let values: Vec<&str> = document
    .find_all("meta")
    .into_iter()
    .filter(|meta| meta.get_attribute_ref(attr) == Some(name))
    .filter_map(|meta| meta.get_attribute_ref("content"))
    .collect();
  if values.is_empty() {
    None
  } else {
    Some(values.join(", "))
  }
}

//! `<picture>` synthesis for delivery URLs.
//!
//! Source order matters: renderers pick the first matching `<source>`, so type-negotiated
//! sources come before same-format fallbacks and media-scoped sources before the unconditional
//! image.

use super::query::{remove_query_param, set_delivery_params};
use super::Decorator;
use crate::config::DeliveryFormat;
use crate::dom::DomNode;
use crate::error::{ConfigError, ParseError, PictureError, Result};
use url::Url;

/// Class tagging pictures built from smart crops.
pub const SMARTCROP_PICTURE_CLASS: &str = "smartcrop";

/// One responsive variant of a picture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakpoint {
  pub media: Option<String>,
  pub width: Option<String>,
  pub smartcrop: Option<String>,
}

impl Breakpoint {
  pub fn width(width: impl Into<String>) -> Self {
    Self {
      width: Some(width.into()),
      ..Self::default()
    }
  }

  pub fn smartcrop(name: impl Into<String>) -> Self {
    Self {
      smartcrop: Some(name.into()),
      ..Self::default()
    }
  }

  pub fn with_media(mut self, media: impl Into<String>) -> Self {
    self.media = Some(media.into());
    self
  }

  /// The delivery parameter selecting this variant: the smart crop when present, else the width.
  fn variant_param(&self, index: usize) -> Result<(&'static str, &str)> {
    if let Some(name) = &self.smartcrop {
      return Ok(("smartcrop", name.as_str()));
    }
    self
      .width
      .as_deref()
      .map(|width| ("width", width))
      .ok_or_else(|| PictureError::MissingBreakpointWidth { index }.into())
  }
}

/// Two variants: 2000px wide from 600px viewports up, 750px below.
pub fn default_breakpoints() -> Vec<Breakpoint> {
  vec![
    Breakpoint::width("2000").with_media("(min-width: 600px)"),
    Breakpoint::width("750"),
  ]
}

/// Text after the final `.` of the URL path, or empty when there is none.
pub fn original_extension(url: &Url) -> &str {
  let path = url.path();
  let name = path.rsplit('/').next().unwrap_or(path);
  match name.rfind('.') {
    Some(idx) => &name[idx + 1..],
    None => "",
  }
}

/// Delivery parameters for a same-format variant. Paths without an extension leave the format
/// to the service.
fn same_format_params<'p>(
  variant: Option<(&'p str, &'p str)>,
  ext: &'p str,
) -> Vec<(&'p str, &'p str)> {
  let mut params: Vec<(&str, &str)> = variant.into_iter().collect();
  if !ext.is_empty() {
    params.push(("format", ext));
  }
  params
}

fn source_node(media: Option<&str>, mime: Option<&str>, srcset: &Url) -> DomNode {
  let mut attributes = Vec::with_capacity(3);
  if let Some(media) = media {
    attributes.push(("media".to_string(), media.to_string()));
  }
  if let Some(mime) = mime {
    attributes.push(("type".to_string(), mime.to_string()));
  }
  attributes.push(("srcset".to_string(), srcset.to_string()));
  DomNode::element("source", attributes)
}

fn img_node(alt: &str, eager: bool, src: &Url) -> DomNode {
  DomNode::element(
    "img",
    vec![
      (
        "loading".to_string(),
        if eager { "eager" } else { "lazy" }.to_string(),
      ),
      ("alt".to_string(), alt.to_string()),
      ("src".to_string(), src.to_string()),
    ],
  )
}

impl Decorator<'_> {
  fn resolve_source(&self, src: &str) -> Result<Url> {
    self.page().resolve(src).ok_or_else(|| {
      ParseError::InvalidUrl {
        url: src.to_string(),
        reason: format!("cannot resolve against {}", self.page().location),
      }
      .into()
    })
  }

  /// Picture with one `type`-negotiated source per breakpoint, same-format fallbacks for all but
  /// the last breakpoint, and an `<img>` built from the last breakpoint.
  pub fn create_optimized_picture(
    &self,
    src: &str,
    alt: &str,
    eager: bool,
    breakpoints: &[Breakpoint],
    format: DeliveryFormat,
  ) -> Result<DomNode> {
    let url = self.resolve_source(src)?;
    let Some((_, rest)) = breakpoints.split_last() else {
      return Err(PictureError::NoBreakpoints.into());
    };
    let widths = breakpoints
      .iter()
      .enumerate()
      .map(|(index, br)| {
        br.width
          .as_deref()
          .ok_or(PictureError::MissingBreakpointWidth { index })
      })
      .collect::<std::result::Result<Vec<_>, _>>()?;
    let ext = original_extension(&url);

    let mut picture = DomNode::element("picture", Vec::new());
    for (br, width) in breakpoints.iter().zip(&widths) {
      let srcset = set_delivery_params(&url, [("width", *width), ("format", format.as_str())]);
      picture.children.push(source_node(
        br.media.as_deref(),
        Some(format.mime_type()),
        &srcset,
      ));
    }
    for (br, width) in rest.iter().zip(&widths) {
      let srcset = set_delivery_params(&url, same_format_params(Some(("width", *width)), ext));
      picture
        .children
        .push(source_node(br.media.as_deref(), None, &srcset));
    }
    let last_width = widths.last().copied().unwrap_or_default();
    let img_src = set_delivery_params(&url, same_format_params(Some(("width", last_width)), ext));
    picture.children.push(img_node(alt, eager, &img_src));
    Ok(picture)
  }

  /// Picture selecting named smart crops by viewport.
  ///
  /// With no breakpoints, one is derived per configured smart crop (in configuration order).
  /// Every breakpoint becomes a `type`-negotiated source and a same-format source; the closing
  /// `<img>` drops the `smartcrop` parameter so it serves the uncropped image.
  pub fn create_optimized_picture_with_smartcrop(
    &self,
    src: &str,
    alt: &str,
    eager: bool,
    breakpoints: &[Breakpoint],
    format: DeliveryFormat,
  ) -> Result<DomNode> {
    let url = self.resolve_source(src)?;
    let derived;
    let breakpoints = if breakpoints.is_empty() {
      derived = self.smartcrop_breakpoints()?;
      derived.as_slice()
    } else {
      breakpoints
    };
    let variants = breakpoints
      .iter()
      .enumerate()
      .map(|(index, br)| br.variant_param(index))
      .collect::<Result<Vec<_>>>()?;
    let ext = original_extension(&url);

    let mut picture = DomNode::element(
      "picture",
      vec![("class".to_string(), SMARTCROP_PICTURE_CLASS.to_string())],
    );
    for (br, (key, value)) in breakpoints.iter().zip(&variants) {
      let srcset = set_delivery_params(&url, [(*key, *value), ("format", format.as_str())]);
      picture.children.push(source_node(
        br.media.as_deref(),
        Some(format.mime_type()),
        &srcset,
      ));
    }
    for (br, (key, value)) in breakpoints.iter().zip(&variants) {
      let srcset = set_delivery_params(&url, same_format_params(Some((*key, *value)), ext));
      picture
        .children
        .push(source_node(br.media.as_deref(), None, &srcset));
    }
    let img_src = remove_query_param(
      &set_delivery_params(&url, same_format_params(None, ext)),
      "smartcrop",
    );
    picture.children.push(img_node(alt, eager, &img_src));
    Ok(picture)
  }

  /// One media-scoped breakpoint per configured smart crop.
  pub fn smartcrop_breakpoints(&self) -> Result<Vec<Breakpoint>> {
    if !self.config().has_smart_crops() {
      return Err(ConfigError::MissingSmartCrops.into());
    }
    Ok(
      self
        .config()
        .smart_crops
        .iter()
        .map(|(name, range)| Breakpoint::smartcrop(name.as_str()).with_media(range.media_query()))
        .collect(),
    )
  }
}

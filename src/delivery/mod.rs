//! External image delivery: rewriting `<img>`/`<a>` references into responsive `<picture>`
//! markup served by an image delivery service.
//!
//! The passes run in a fixed order over a markup subtree:
//! smart-crop marking → classification → picture synthesis → in-place replacement, followed by
//! a second pass resolving pictures whose `alt` carries an encoded delivery reference.
//! [`Decorator`] bundles the site configuration and page context every pass needs.

pub mod alt;
pub mod classify;
pub mod decorate;
pub mod picture;
pub mod query;
pub mod smartcrop;

use crate::config::{DeliveryConfig, PageContext};

pub use classify::{classify, Classification, PictureHandler};
pub use decorate::DecorationReport;
pub use picture::{default_breakpoints, Breakpoint};
pub use smartcrop::{SmartCropStatus, StatusTable};

/// Link text marking an `<a>` as a placeholder for an external image.
pub const EXTERNAL_IMAGE_MARKER: &str = "//External Image//";

/// Entry point for the decoration passes.
#[derive(Debug, Clone, Copy)]
pub struct Decorator<'a> {
  config: &'a DeliveryConfig,
  page: &'a PageContext,
  in_smartcrop_section: bool,
}

impl<'a> Decorator<'a> {
  pub fn new(config: &'a DeliveryConfig, page: &'a PageContext) -> Self {
    Self {
      config,
      page,
      in_smartcrop_section: false,
    }
  }

  /// Decorate a subtree detached from a section whose metadata opts into smart crops.
  pub fn in_smartcrop_section(mut self, opted_in: bool) -> Self {
    self.in_smartcrop_section = opted_in;
    self
  }

  pub fn config(&self) -> &'a DeliveryConfig {
    self.config
  }

  pub fn page(&self) -> &'a PageContext {
    self.page
  }
}

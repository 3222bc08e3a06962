//! Responsive picture markup for externally delivered images, and block loading.
//!
//! fastpicture works on an owned HTML tree ([`DomNode`]) parsed with html5ever. The
//! [`delivery`] passes rewrite `<img>`/`<a>` references to an image delivery service into
//! `<picture>` elements with format negotiated and width (or smart crop) selected sources. The
//! [`blocks`] module discovers page blocks and loads each one exactly once: its images are
//! decorated, then its stylesheet and script module load concurrently.
//!
//! # Example
//!
//! ```rust,no_run
//! use fastpicture::{parse_html, DeliveryConfig, Decorator, PageContext, EXTERNAL_IMAGE_MARKER};
//! use url::Url;
//!
//! # fn main() -> fastpicture::Result<()> {
//! let mut document = parse_html("<a href=\"https://cdn.example/cat.jpg\">//External Image//</a>")?;
//! let config = DeliveryConfig::default();
//! let page = PageContext::from_document(&document, Url::parse("https://site.example/").unwrap());
//! Decorator::new(&config, &page).decorate_external_images(&mut document, EXTERNAL_IMAGE_MARKER);
//! println!("{}", document.to_html());
//! # Ok(())
//! # }
//! ```

pub mod blocks;
pub mod config;
pub mod delivery;
pub mod dom;
pub mod error;
pub mod resource;

pub use blocks::{collect_blocks, Block, BlockLoader, BlockModule, BlockStatus, ModuleRegistry};
pub use config::{DeliveryConfig, DeliveryFormat, ExternalPrefix, PageContext, SmartCropRange};
pub use delivery::{Breakpoint, DecorationReport, Decorator, EXTERNAL_IMAGE_MARKER};
pub use dom::{parse_html, DomNode, DomNodeType};
pub use error::{Error, Result};
pub use resource::{FetchStylesheetLoader, StylesheetLoader, StylesheetRegistry};

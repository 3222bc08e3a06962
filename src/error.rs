//! Error types for fastpicture
//!
//! This module provides error types for each subsystem:
//! - Parse errors (HTML, URLs)
//! - Configuration errors (prefix entries, smart-crop settings)
//! - Picture synthesis errors (breakpoints)
//! - Block loading errors (module registry, module execution)
//! - Resource errors (stylesheet fetches)
//!
//! Most of these never reach the page: the decoration passes skip the
//! offending node and the block loader logs and carries on. They are
//! surfaced by the lower-level operations so callers embedding the library
//! can decide for themselves.

use thiserror::Error;

/// Result type alias for fastpicture operations
///
/// # Examples
///
/// ```
/// use fastpicture::Result;
///
/// fn decorate(html: &str) -> Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for fastpicture
///
/// Each variant wraps a more specific error type for that subsystem.
#[derive(Error, Debug)]
pub enum Error {
  /// HTML or URL parsing error
  #[error("Parse error: {0}")]
  Parse(#[from] ParseError),

  /// Invalid or missing configuration
  #[error("Config error: {0}")]
  Config(#[from] ConfigError),

  /// Picture synthesis error
  #[error("Picture error: {0}")]
  Picture(#[from] PictureError),

  /// Block module error
  #[error("Block error: {0}")]
  Block(#[from] BlockError),

  /// Stylesheet or other resource failure
  #[error("Resource error: {0}")]
  Resource(#[from] ResourceError),

  /// I/O error (config or HTML files)
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  /// Malformed JSON configuration
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  /// Generic error for miscellaneous issues
  #[error("{0}")]
  Other(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
  /// Invalid HTML structure
  #[error("Invalid HTML at line {line}: {message}")]
  InvalidHtml { message: String, line: usize },

  /// URL that cannot be resolved against the page location
  #[error("Invalid URL '{url}': {reason}")]
  InvalidUrl { url: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  /// Smart-crop breakpoints were requested but no crops are configured
  #[error("no smart crops configured and no breakpoints supplied")]
  MissingSmartCrops,

  /// Prefix entry that is neither a string nor a `[prefix, format]` pair
  #[error("invalid external image prefix entry: {entry}")]
  InvalidPrefix { entry: String },

  /// Unsupported delivery format
  #[error("unknown image format '{format}'")]
  UnknownFormat { format: String },

  /// Smart crop with an inverted or empty width range
  #[error("smart crop '{name}': {reason}")]
  InvalidSmartCrop { name: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PictureError {
  /// A breakpoint without `smartcrop` must carry a width
  #[error("breakpoint {index} has neither a width nor a smart crop")]
  MissingBreakpointWidth { index: usize },

  /// Uniform synthesis needs at least one breakpoint
  #[error("no breakpoints supplied")]
  NoBreakpoints,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
  /// No module registered under the block name
  #[error("no module registered for block '{name}' ({path})")]
  ModuleNotFound { name: String, path: String },

  /// The module's entry point reported a failure
  #[error("block '{name}' failed: {message}")]
  ModuleFailed { name: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
  /// Nothing is served at the URL
  #[error("resource not found: {url}")]
  NotFound { url: String },

  /// The fetch itself failed
  #[error("failed to fetch {url}: {reason}")]
  FetchFailed { url: String, reason: String },

  /// A stylesheet was requested but something else came back
  #[error("unexpected content type '{content_type}' for {url}")]
  UnexpectedContentType { url: String, content_type: String },
}

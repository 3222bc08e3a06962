use clap::Parser;
use fastpicture::blocks::BlockLoader;
use fastpicture::config::{DeliveryConfig, PageContext};
use fastpicture::delivery::{Decorator, EXTERNAL_IMAGE_MARKER};
use fastpicture::dom::parse_html;
use fastpicture::resource::{DirectoryFetcher, FetchStylesheetLoader, StylesheetRegistry};
use fastpicture::ModuleRegistry;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Rewrite external image references in an HTML document into responsive pictures.
#[derive(Parser, Debug)]
#[command(name = "decorate_html", version, about)]
struct Args {
  /// HTML file to decorate
  input: PathBuf,

  /// Site configuration (JSON)
  #[arg(long)]
  config: Option<PathBuf>,

  /// URL the page is served from; relative image URLs resolve against it
  #[arg(long, default_value = "https://localhost/")]
  location: Url,

  /// Link text marking placeholder links for external images
  #[arg(long, default_value = EXTERNAL_IMAGE_MARKER)]
  marker: String,

  /// Do not resolve pictures whose alt text carries a delivery reference
  #[arg(long)]
  skip_alt: bool,

  /// Load blocks, fetching their stylesheets from this directory
  #[arg(long)]
  site_root: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let config = match &args.config {
    Some(path) => DeliveryConfig::from_path(path)?,
    None => DeliveryConfig::default(),
  };
  let html = fs::read_to_string(&args.input)?;
  let mut document = parse_html(&html)?;
  let page = PageContext::from_document(&document, args.location.clone());

  if let Some(root) = &args.site_root {
    let loader = BlockLoader::new(
      Arc::new(config.clone()),
      Arc::new(page.clone()),
      ModuleRegistry::new(),
      Arc::new(FetchStylesheetLoader::new(DirectoryFetcher::new(root))),
    )
    .with_linked_stylesheets(StylesheetRegistry::from_document(&document))
    .with_marker(args.marker.clone());
    let blocks = futures::executor::block_on(loader.load_document(&mut document));
    info!(blocks = blocks.len(), "loaded blocks");
  }

  let decorator = Decorator::new(&config, &page);
  let report = decorator.decorate_external_images(&mut document, &args.marker);
  let from_alt = if args.skip_alt {
    0
  } else {
    decorator.decorate_images_from_alt(&mut document)
  };
  info!(
    external = report.replaced,
    smartcrop = report.smartcrop.len(),
    from_alt,
    "decorated document"
  );

  println!("{}", document.to_html());
  Ok(())
}

use fastpicture::delivery::alt::decode_alt_payload;
use fastpicture::delivery::query::{append_query_params, is_allowed_param, query_params};
use fastpicture::delivery::{default_breakpoints, Breakpoint, Decorator, EXTERNAL_IMAGE_MARKER};
use fastpicture::{parse_html, DeliveryConfig, DeliveryFormat, DomNode, PageContext};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use url::Url;

const CONFIG: &str = r#"{
  "externalImageUrlPrefixes": [
    "https://legacy.example/",
    ["https://dm.example/", "avif"]
  ],
  "smartCrops": {
    "Small": { "minWidth": 0, "maxWidth": 599 },
    "Large": { "minWidth": 600 }
  },
  "codeBasePath": "/code/"
}"#;

fn config() -> DeliveryConfig {
  DeliveryConfig::from_json_str(CONFIG).expect("config")
}

fn page() -> PageContext {
  PageContext::new(Url::parse("https://site.example/en/page").expect("url"))
}

fn srcs(picture: &DomNode) -> Vec<Url> {
  picture
    .children
    .iter()
    .filter_map(|c| {
      c.get_attribute_ref("srcset")
        .or_else(|| c.get_attribute_ref("src"))
    })
    .map(|raw| Url::parse(raw).expect("generated url"))
    .collect()
}

#[test]
fn config_normalizes_legacy_and_pair_prefixes() {
  let config = config();
  let formats: Vec<_> = config
    .external_image_url_prefixes
    .iter()
    .map(|p| (p.prefix.as_str(), p.format))
    .collect();
  assert_eq!(
    formats,
    vec![
      ("https://legacy.example/", DeliveryFormat::Webp),
      ("https://dm.example/", DeliveryFormat::Avif),
    ]
  );
  assert_eq!(config.code_base_path, "/code");
  let names: Vec<_> = config.smart_crops.keys().map(String::as_str).collect();
  assert_eq!(names, vec!["Small", "Large"]);
}

#[test]
fn append_query_params_only_adds_allow_listed_keys() {
  let base = Url::parse("https://cdn.example/a.jpg?tracking=1").expect("url");
  let once = append_query_params(
    &base,
    [("crop", "1,1,10,10"), ("format", "gif"), ("evil", "x"), ("width", "300")],
  );
  for (key, _) in query_params(&once) {
    assert!(key == "tracking" || is_allowed_param(&key), "unexpected key {key}");
  }
  let twice = append_query_params(&once, [("crop", "1,1,10,10"), ("width", "300")]);
  assert_eq!(query_params(&once), query_params(&twice));
}

#[test]
fn uniform_picture_from_default_breakpoints() {
  let config = config();
  let page = page();
  let picture = Decorator::new(&config, &page)
    .create_optimized_picture(
      "/media/hero.png",
      "hero",
      true,
      &default_breakpoints(),
      DeliveryFormat::Webp,
    )
    .expect("picture");

  let tags: Vec<_> = picture.children.iter().filter_map(|c| c.tag_name()).collect();
  assert_eq!(tags, vec!["source", "source", "source", "img"]);
  let img = picture.children.last().expect("img");
  assert_eq!(img.get_attribute_ref("loading"), Some("eager"));
  assert_eq!(
    img.get_attribute_ref("src"),
    Some("https://site.example/media/hero.png?width=750&format=png")
  );
}

#[test]
fn smartcrop_picture_derives_breakpoints_from_config() {
  let config = config();
  let page = page();
  let picture = Decorator::new(&config, &page)
    .create_optimized_picture_with_smartcrop(
      "https://x.example/adobe/assets/urn:aaid:aem:9/as/cat.jpg?width=100",
      "cat",
      false,
      &[],
      DeliveryFormat::Avif,
    )
    .expect("picture");

  assert!(picture.has_class("smartcrop"));
  let media: Vec<_> = picture
    .children
    .iter()
    .filter_map(|c| c.get_attribute_ref("media"))
    .collect();
  assert_eq!(
    media,
    vec![
      "(min-width: 0px) and (max-width: 599px)",
      "(min-width: 600px)",
      "(min-width: 0px) and (max-width: 599px)",
      "(min-width: 600px)",
    ]
  );
  let urls = srcs(&picture);
  let img = urls.last().expect("img");
  assert!(query_params(img).iter().all(|(k, _)| k != "smartcrop"));
  assert!(query_params(&urls[0]).contains(&("smartcrop".to_string(), "Small".to_string())));
}

#[test]
fn explicit_smartcrop_breakpoints_are_used_as_given() {
  let config = DeliveryConfig::default();
  let page = page();
  let picture = Decorator::new(&config, &page)
    .create_optimized_picture_with_smartcrop(
      "https://x.example/adobe/assets/urn:aaid:aem:9/as/cat.jpg",
      "",
      false,
      &[Breakpoint::smartcrop("Square").with_media("(max-width: 400px)")],
      DeliveryFormat::Webp,
    )
    .expect("picture");
  assert_eq!(picture.children.len(), 3);
}

#[test]
fn document_decoration_end_to_end() {
  let html = format!(
    "<html><head></head><body><main><div>\
      <p><a href=\"https://cdn.example/img.jpg?crop=1,1,10,10\">{EXTERNAL_IMAGE_MARKER}</a></p>\
      <p><img src=\"https://dm.example/photo.jpeg\" alt=\"photo\"></p>\
      <p><img src=\"https://dm.example/logo.svg\" alt=\"logo\"></p>\
      <p><img src=\"/local.png\" alt=\"local\"></p>\
      <p><a href=\"/about\">About</a></p>\
    </div></main></body></html>"
  );
  let mut document = parse_html(&html).expect("parse");
  let config = config();
  let page = PageContext::from_document(&document, page().location);
  let report =
    Decorator::new(&config, &page).decorate_external_images(&mut document, EXTERNAL_IMAGE_MARKER);
  assert_eq!(report.replaced, 2);

  let pictures = document.find_all("picture");
  assert_eq!(pictures.len(), 2);
  for url in srcs(pictures[0]) {
    assert!(query_params(&url).contains(&("crop".to_string(), "1,1,10,10".to_string())));
  }
  assert_eq!(
    pictures[1].children[0].get_attribute_ref("type"),
    Some("image/avif")
  );

  let images: Vec<_> = document
    .find_all("img")
    .into_iter()
    .filter_map(|img| img.get_attribute_ref("alt"))
    .collect();
  assert!(images.contains(&"logo"));
  assert!(images.contains(&"local"));
  assert!(document.find_first("a").is_some());

  let out = document.to_html();
  assert!(out.starts_with("<!DOCTYPE html>"));
  assert!(out.contains("<picture>"));
}

#[test]
fn alt_payload_pictures_are_resolved() {
  let payload = utf8_percent_encode(
    r#"{"deliveryUrl":"https://x/adobe/assets/urn:aaid:aem:1","altText":"cat"}"#,
    NON_ALPHANUMERIC,
  )
  .to_string();
  assert!(decode_alt_payload(&payload).is_some());

  let html = format!(
    "<picture><img src=\"/a.png\" alt=\"{payload}\"></picture>\
     <picture><img src=\"/b.png\" alt=\"plain text\"></picture>"
  );
  let mut document = parse_html(&html).expect("parse");
  let config = config();
  let page = page();
  let replaced = Decorator::new(&config, &page).decorate_images_from_alt(&mut document);
  assert_eq!(replaced, 1);

  let pictures = document.find_all("picture");
  assert!(pictures[0].has_class("smartcrop"));
  let cat = pictures[0].children.last().expect("img");
  assert_eq!(cat.get_attribute_ref("alt"), Some("cat"));
  assert_eq!(pictures[1].children.len(), 1);
  assert_eq!(
    pictures[1].children[0].get_attribute_ref("alt"),
    Some("plain text")
  );
}

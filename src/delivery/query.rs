//! Delivery query strings.
//!
//! Author-supplied parameters are only ever copied onto generated URLs through
//! [`append_query_params`], which filters them against [`ALLOWED_PARAMS`]. URLs are treated as
//! values: every helper returns a new [`Url`] and leaves its input alone.

use url::Url;

/// Query parameters the delivery service accepts from authors.
pub const ALLOWED_PARAMS: [&str; 9] = [
  "rotate",
  "crop",
  "flip",
  "size",
  "preferwebp",
  "height",
  "width",
  "quality",
  "smartcrop",
];

pub fn is_allowed_param(key: &str) -> bool {
  ALLOWED_PARAMS.contains(&key)
}

/// Decoded query pairs in order of appearance.
pub fn query_params(url: &Url) -> Vec<(String, String)> {
  url.query_pairs().into_owned().collect()
}

/// Set every allow-listed key of `params` on a copy of `url`, overwriting existing values.
///
/// Keys outside [`ALLOWED_PARAMS`] are dropped. Parameters already present on `url` are kept
/// whether or not they are allow-listed.
pub fn append_query_params<I, K, V>(url: &Url, params: I) -> Url
where
  I: IntoIterator<Item = (K, V)>,
  K: AsRef<str>,
  V: AsRef<str>,
{
  set_params(
    url,
    params
      .into_iter()
      .filter(|(key, _)| is_allowed_param(key.as_ref())),
  )
}

/// Set the parameters picture synthesis owns (`width`, `smartcrop` and the negotiated `format`).
pub(crate) fn set_delivery_params<I, K, V>(url: &Url, params: I) -> Url
where
  I: IntoIterator<Item = (K, V)>,
  K: AsRef<str>,
  V: AsRef<str>,
{
  set_params(url, params)
}

/// Copy of `url` without any occurrence of `key`.
pub fn remove_query_param(url: &Url, key: &str) -> Url {
  let pairs: Vec<(String, String)> = query_params(url)
    .into_iter()
    .filter(|(k, _)| k != key)
    .collect();
  let mut out = url.clone();
  write_pairs(&mut out, &pairs);
  out
}

fn set_params<I, K, V>(url: &Url, params: I) -> Url
where
  I: IntoIterator<Item = (K, V)>,
  K: AsRef<str>,
  V: AsRef<str>,
{
  let mut pairs = query_params(url);
  for (key, value) in params {
    let (key, value) = (key.as_ref(), value.as_ref());
    // Same semantics as URLSearchParams.set: the first occurrence keeps its position, later
    // duplicates go away.
    match pairs.iter().position(|(k, _)| k == key) {
      Some(first) => {
        pairs[first].1 = value.to_string();
        let mut idx = 0;
        pairs.retain(|(k, _)| {
          let keep = idx <= first || k != key;
          idx += 1;
          keep
        });
      }
      None => pairs.push((key.to_string(), value.to_string())),
    }
  }
  let mut out = url.clone();
  write_pairs(&mut out, &pairs);
  out
}

fn write_pairs(url: &mut Url, pairs: &[(String, String)]) {
  if pairs.is_empty() {
    url.set_query(None);
    return;
  }
  url
    .query_pairs_mut()
    .clear()
    .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
}

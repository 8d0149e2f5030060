//! Cache keys for intercepted requests.

use sha2::{Digest, Sha256};
use url::Url;

use super::types::InterceptedRequest;

/// Normalized identity of a request inside a cache generation.
///
/// Two requests match when their upper-cased method and their URL (minus the
/// fragment) are equal. Query strings are significant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey {
  method: String,
  url: Url,
}

impl RequestKey {
  pub fn new(method: &str, url: &Url) -> Self {
    let mut url = url.clone();
    url.set_fragment(None);
    Self {
      method: method.to_ascii_uppercase(),
      url,
    }
  }

  /// Key for a GET of `url`, used for manifest entries and fallback documents.
  pub fn get(url: &Url) -> Self {
    Self::new("GET", url)
  }

  pub fn for_request(request: &InterceptedRequest) -> Self {
    Self::new(request.method.as_str(), &request.url)
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn url(&self) -> &Url {
    &self.url
  }

  /// SHA256 of `METHOD URL`, hex encoded; stable and fixed-length.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.description().as_bytes());
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> String {
    format!("{} {}", self.method, self.url)
  }
}

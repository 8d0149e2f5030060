use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::{Origin, Url};

/// Headers that only make sense for a single connection and are never
/// copied between the client and upstream sides of the proxy.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
  "connection",
  "keep-alive",
  "proxy-authenticate",
  "proxy-authorization",
  "te",
  "trailer",
  "transfer-encoding",
  "upgrade",
  "host",
  "content-length",
];

/// Whether a header should be dropped when forwarding.
pub fn is_hop_by_hop(name: &str) -> bool {
  HOP_BY_HOP_HEADERS
    .iter()
    .any(|h| h.eq_ignore_ascii_case(name))
}

/// A request handed to the controller by the platform adapter.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
  pub method: Method,
  pub url: Url,
  pub headers: Vec<(String, String)>,
  /// Top-level document load (`Sec-Fetch-Mode: navigate`)
  pub navigate: bool,
  /// Only forwarded on pass-through, never cached
  pub body: Vec<u8>,
}

impl InterceptedRequest {
  /// Create a bodyless GET request for `url`.
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      headers: Vec::new(),
      navigate: false,
      body: Vec::new(),
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn with_navigate(mut self, navigate: bool) -> Self {
    self.navigate = navigate;
    self
  }

  pub fn with_body(mut self, body: Vec<u8>) -> Self {
    self.body = body;
    self
  }

  /// First value of header `name` (case-insensitive).
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// Every value of header `name` (case-insensitive), in arrival order.
  pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    self
      .headers
      .iter()
      .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn origin(&self) -> Origin {
    self.url.origin()
  }

  /// Navigation, or anything that asks for an HTML document.
  pub fn is_html_navigation(&self) -> bool {
    self.navigate
      || self
        .header_values("accept")
        .any(|accept| accept.contains("text/html"))
  }
}

/// Snapshot of a full HTTP response, as served or stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: Vec::new(),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
    self.body = body.into();
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// 2xx status.
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// 206 responses are never stored.
  pub fn is_partial(&self) -> bool {
    self.status == 206
  }
}

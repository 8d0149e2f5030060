use crate::config::Config;
use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::types::{is_hop_by_hop, InterceptedRequest, Response};

/// Anything that can perform a real network round trip for a request.
///
/// An `Err` always means a transport failure. HTTP error statuses are
/// successful fetches.
pub trait Fetcher: Send + Sync + 'static {
  fn fetch(&self, request: &InterceptedRequest) -> impl Future<Output = Result<Response>> + Send;
}

/// reqwest-backed fetcher that maps the public origin onto the upstream server.
#[derive(Clone)]
pub struct NetworkClient {
  client: reqwest::Client,
  origin: Url,
  upstream: Url,
}

impl NetworkClient {
  pub fn new(config: &Config) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.server.network_timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      origin: config.app.origin.clone(),
      upstream: config.app.upstream.clone(),
    })
  }

  /// Same-origin URLs are rewritten to point at the upstream server, below
  /// any base path it carries; anything else is fetched as-is.
  fn upstream_url(&self, url: &Url) -> Result<Url> {
    if url.origin() != self.origin.origin() {
      return Ok(url.clone());
    }

    let mut target = self.upstream.clone();
    let base = self.upstream.path().trim_end_matches('/');
    target.set_path(&format!("{}{}", base, url.path()));
    target.set_query(url.query());
    target.set_fragment(None);
    if !target.has_host() {
      return Err(eyre!("Upstream URL has no host: {}", self.upstream));
    }
    Ok(target)
  }
}

impl Fetcher for NetworkClient {
  async fn fetch(&self, request: &InterceptedRequest) -> Result<Response> {
    let target = self.upstream_url(&request.url)?;
    debug!("fetch {} {}", request.method, target);

    let mut builder = self.client.request(request.method.clone(), target.clone());
    for (name, value) in &request.headers {
      if !is_hop_by_hop(name) {
        builder = builder.header(name.as_str(), value.as_str());
      }
    }
    if !request.body.is_empty() {
      builder = builder.body(request.body.clone());
    }

    let res = builder
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", target, e))?;

    let status = res.status().as_u16();
    let headers = res
      .headers()
      .iter()
      .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = res
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", target, e))?
      .to_vec();

    Ok(Response {
      status,
      headers,
      body,
    })
  }
}

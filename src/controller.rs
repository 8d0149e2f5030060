//! Offline cache controller: generation lifecycle plus request routing.
//!
//! The controller owns one version tag. Installing pre-caches the asset
//! manifest into that generation, activating evicts every other generation
//! and starts intercepting, and routing picks network-first for HTML and
//! cache-first for everything else on the app's own origin.

use std::sync::Arc;

use color_eyre::Result;
use futures::future::try_join_all;
use reqwest::Method;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};
use url::{Origin, Url};

use crate::cache::{CacheLayer, CacheResult, CacheStorage};
use crate::config::Config;
use crate::error::OfflineError;
use crate::http::{Fetcher, InterceptedRequest, RequestKey, Response};

/// The only control message the controller understands.
pub const SKIP_WAITING: &str = "SKIP_WAITING";

/// Lifecycle of one controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  /// Created, nothing cached yet
  Parsed,
  /// Pre-caching the manifest
  Installing,
  /// Manifest cached, waiting to take over
  Installed,
  /// Evicting stale generations
  Activating,
  /// Intercepting requests
  Activated,
  /// Install failed; never intercepts
  Redundant,
}

impl std::fmt::Display for LifecycleState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      LifecycleState::Parsed => write!(f, "parsed"),
      LifecycleState::Installing => write!(f, "installing"),
      LifecycleState::Installed => write!(f, "installed"),
      LifecycleState::Activating => write!(f, "activating"),
      LifecycleState::Activated => write!(f, "activated"),
      LifecycleState::Redundant => write!(f, "redundant"),
    }
  }
}

/// Messages accepted on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
  SkipWaiting,
}

impl ControlSignal {
  /// Accepts the bare literal or a JSON string (`"SKIP_WAITING"`).
  pub fn parse(payload: &str) -> Option<Self> {
    let payload = payload.trim();
    let payload = payload
      .strip_prefix('"')
      .and_then(|p| p.strip_suffix('"'))
      .unwrap_or(payload);

    (payload == SKIP_WAITING).then_some(ControlSignal::SkipWaiting)
  }
}

/// How a request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Not intercepted; default network handling
  Passthrough,
  NetworkFirst,
  CacheFirst,
}

/// Outcome of routing one request.
#[derive(Debug)]
pub enum Routed {
  Passthrough,
  Respond(CacheResult<Response>),
}

/// Inputs fixed for the lifetime of a controller.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
  /// Tag of the generation this controller owns
  pub version: String,
  /// Requests from any other origin are never intercepted
  pub origin: Url,
  /// Absolute URLs pre-cached on install
  pub manifest: Vec<Url>,
  /// App shell served to navigations when offline
  pub index_document: Url,
  /// Last-resort document when offline
  pub offline_document: Url,
  /// Skip waiting as soon as install succeeds
  pub eager_takeover: bool,
}

impl ControllerOptions {
  pub fn from_config(config: &Config) -> Result<Self> {
    let manifest = config
      .cache
      .manifest
      .iter()
      .map(|relative| config.resolve(relative))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      version: config.cache.version.clone(),
      origin: config.app.origin.clone(),
      manifest,
      index_document: config.resolve(&config.cache.index_document)?,
      offline_document: config.resolve(&config.cache.offline_document)?,
      eager_takeover: config.cache.eager_takeover,
    })
  }
}

pub struct OfflineCacheController<S: CacheStorage, F: Fetcher> {
  options: ControllerOptions,
  origin: Origin,
  index_key: RequestKey,
  offline_key: RequestKey,
  cache: CacheLayer<S>,
  fetcher: Arc<F>,
  state: watch::Sender<LifecycleState>,
  skip_waiting: watch::Sender<bool>,
}

impl<S: CacheStorage, F: Fetcher> OfflineCacheController<S, F> {
  pub fn new(options: ControllerOptions, storage: Arc<S>, fetcher: Arc<F>) -> Self {
    let (state, _) = watch::channel(LifecycleState::Parsed);
    let (skip_waiting, _) = watch::channel(false);

    Self {
      origin: options.origin.origin(),
      index_key: RequestKey::get(&options.index_document),
      offline_key: RequestKey::get(&options.offline_document),
      cache: CacheLayer::new(storage, options.version.clone()),
      fetcher,
      state,
      skip_waiting,
      options,
    }
  }

  pub fn version(&self) -> &str {
    &self.options.version
  }

  /// Public origin of the application.
  pub fn origin(&self) -> &Url {
    &self.options.origin
  }

  pub fn state(&self) -> LifecycleState {
    *self.state.borrow()
  }

  /// Whether requests are being intercepted.
  pub fn is_controlling(&self) -> bool {
    self.state() == LifecycleState::Activated
  }

  fn set_state(&self, state: LifecycleState) {
    let previous = self.state.send_replace(state);
    if previous != state {
      debug!(version = %self.options.version, "lifecycle {} -> {}", previous, state);
    }
  }

  /// Pre-cache every manifest URL into this controller's generation.
  ///
  /// Either every entry is stored or none is. On success the controller is
  /// `Installed` and, with eager takeover, already flagged to skip waiting.
  pub async fn install(&self) -> Result<(), OfflineError> {
    self.set_state(LifecycleState::Installing);

    match self.precache().await {
      Ok(count) => {
        info!(version = %self.options.version, "Pre-cached {} assets", count);
        self.set_state(LifecycleState::Installed);
        if self.options.eager_takeover {
          self.skip_waiting();
        }
        Ok(())
      }
      Err(e) => {
        self.set_state(LifecycleState::Redundant);
        Err(e)
      }
    }
  }

  async fn precache(&self) -> Result<usize, OfflineError> {
    let storage = self.cache.storage();
    storage.open_generation(&self.options.version)?;

    let fetches = self.options.manifest.iter().map(|url| async move {
      let request = InterceptedRequest::get(url.clone());
      let response =
        self
          .fetcher
          .fetch(&request)
          .await
          .map_err(|e| OfflineError::ManifestFetch {
            url: url.to_string(),
            reason: e.to_string(),
          })?;

      if !response.is_ok() {
        return Err(OfflineError::ManifestFetch {
          url: url.to_string(),
          reason: format!("HTTP status {}", response.status),
        });
      }

      Ok((RequestKey::get(url), response))
    });

    let entries = try_join_all(fetches).await?;
    self.cache.store_all(&entries)?;

    Ok(entries.len())
  }

  /// Pick up a generation left complete by an earlier run with the same tag.
  ///
  /// Returns false when a full install is needed.
  pub fn restore(&self) -> Result<bool, OfflineError> {
    let storage = self.cache.storage();
    let version = &self.options.version;

    if !storage.generations()?.iter().any(|tag| tag == version) {
      return Ok(false);
    }
    for url in &self.options.manifest {
      if storage.get(version, &RequestKey::get(url))?.is_none() {
        debug!("Generation {} is missing {}", version, url);
        return Ok(false);
      }
    }

    info!(version = %version, "Reusing cached generation");
    self.set_state(LifecycleState::Installed);
    if self.options.eager_takeover {
      self.skip_waiting();
    }
    Ok(true)
  }

  /// Stop waiting for older clients; activation may proceed immediately.
  pub fn skip_waiting(&self) {
    self.skip_waiting.send_replace(true);
  }

  /// Handle one control-channel message. Unknown payloads are ignored.
  pub fn handle_control_signal(&self, payload: &str) {
    match ControlSignal::parse(payload) {
      Some(ControlSignal::SkipWaiting) => {
        info!("Skip waiting requested");
        self.skip_waiting();
      }
      None => trace!("Ignoring control message {:?}", payload),
    }
  }

  /// Resolve once activation may go ahead: immediately on a first install
  /// (no other generation stored) or once skip-waiting has been signaled.
  /// Requests pass through uncached while this is pending.
  pub async fn wait_until_activatable(&self) {
    let mut skip = self.skip_waiting.subscribe();
    let skipped = *skip.borrow_and_update();
    if skipped || !self.has_previous_generation() {
      return;
    }

    info!("Waiting for {} before activating", SKIP_WAITING);
    loop {
      if skip.changed().await.is_err() {
        return;
      }
      if *skip.borrow_and_update() {
        return;
      }
    }
  }

  fn has_previous_generation(&self) -> bool {
    match self.cache.storage().generations() {
      Ok(tags) => tags.iter().any(|tag| tag != &self.options.version),
      Err(e) => {
        warn!("Failed to list cache generations: {}", e);
        false
      }
    }
  }

  /// Delete every generation except ours and start intercepting.
  ///
  /// Deletion is best-effort per generation. Returns the tags that were
  /// actually removed.
  pub fn activate(&self) -> Vec<String> {
    self.set_state(LifecycleState::Activating);

    let storage = self.cache.storage();
    let mut evicted = Vec::new();

    match storage.generations() {
      Ok(tags) => {
        for tag in tags.into_iter().filter(|tag| tag != &self.options.version) {
          match storage.delete_generation(&tag) {
            Ok(_) => {
              info!("Deleted stale cache generation {}", tag);
              evicted.push(tag);
            }
            Err(e) => warn!("Failed to delete stale cache generation {}: {}", tag, e),
          }
        }
      }
      Err(e) => warn!("Failed to list cache generations: {}", e),
    }

    self.set_state(LifecycleState::Activated);
    info!(version = %self.options.version, "Activated; intercepting requests");
    evicted
  }

  /// Decide how a request is handled. Never suspends.
  pub fn classify(&self, request: &InterceptedRequest) -> Strategy {
    if !self.is_controlling() {
      return Strategy::Passthrough;
    }
    if request.method != Method::GET {
      return Strategy::Passthrough;
    }
    if request.origin() != self.origin {
      return Strategy::Passthrough;
    }

    if request.is_html_navigation() {
      Strategy::NetworkFirst
    } else {
      Strategy::CacheFirst
    }
  }

  /// Route one intercepted request.
  ///
  /// `Routed::Passthrough` means the caller should apply default network
  /// handling (see [`Self::forward`]). The only error is `NoOfflineContent`.
  pub async fn route(&self, request: &InterceptedRequest) -> Result<Routed, OfflineError> {
    let strategy = self.classify(request);
    let key = RequestKey::for_request(request);

    let result = match strategy {
      Strategy::Passthrough => return Ok(Routed::Passthrough),
      Strategy::NetworkFirst => {
        self
          .cache
          .network_first(&key, &[&self.index_key, &self.offline_key], || {
            self.fetcher.fetch(request)
          })
          .await?
      }
      Strategy::CacheFirst => {
        self
          .cache
          .cache_first(&key, &self.offline_key, || self.fetcher.fetch(request))
          .await?
      }
    };

    debug!("{:?} {} -> {}", strategy, key.description(), result.source);
    Ok(Routed::Respond(result))
  }

  /// Default network handling for requests that are not intercepted.
  pub async fn forward(&self, request: &InterceptedRequest) -> Result<Response> {
    self.fetcher.fetch(request).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::testing::{
    app_url, eventually, test_controller, test_options, FakeNetwork, FlakyStorage, TestController,
  };
  use std::time::Duration;

  fn url(path: &str) -> Url {
    app_url(path)
  }

  fn options(version: &str) -> ControllerOptions {
    test_options(version)
  }

  struct Fixture {
    controller: Arc<TestController>,
    network: Arc<FakeNetwork>,
    storage: Arc<FlakyStorage>,
  }

  fn fixture_with(options: ControllerOptions) -> Fixture {
    let (controller, network, storage) = test_controller(options);
    Fixture {
      controller,
      network,
      storage,
    }
  }

  fn fixture() -> Fixture {
    fixture_with(options("v5"))
  }

  /// Installed and activated, with the network switched off.
  async fn active_offline_fixture() -> Fixture {
    let f = fixture();
    f.controller.install().await.unwrap();
    f.controller.activate();
    f.network.set_offline(true);
    f
  }

  fn navigation(path: &str) -> InterceptedRequest {
    InterceptedRequest::get(url(path)).with_navigate(true)
  }

  fn body(routed: Routed) -> Vec<u8> {
    match routed {
      Routed::Respond(result) => result.data.body,
      Routed::Passthrough => panic!("expected a response"),
    }
  }

  #[tokio::test]
  async fn test_precache_completeness() {
    let f = fixture();
    f.controller.install().await.unwrap();
    assert_eq!(f.controller.state(), LifecycleState::Installed);
    f.controller.activate();

    let calls = f.network.calls();
    f.network.set_offline(true);
    for path in ["./manifest.webmanifest", "./icon-192.png", "./offline.html"] {
      let routed = f
        .controller
        .route(&InterceptedRequest::get(url(path)))
        .await
        .unwrap();
      match routed {
        Routed::Respond(result) => assert_eq!(result.source, CacheSource::Cache),
        Routed::Passthrough => panic!("{} not intercepted", path),
      }
    }
    assert_eq!(f.network.calls(), calls);
  }

  #[tokio::test]
  async fn test_install_fails_atomically_on_missing_asset() {
    let mut opts = options("v5");
    opts.manifest.push(url("./apple-touch-icon-180.png"));
    let f = fixture_with(opts);

    let err = f.controller.install().await.unwrap_err();
    match err {
      OfflineError::ManifestFetch { url, reason } => {
        assert!(url.ends_with("apple-touch-icon-180.png"));
        assert!(reason.contains("404"));
      }
      other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(f.controller.state(), LifecycleState::Redundant);
    assert!(f.storage.entries("v5").unwrap().is_empty());
    assert!(!f.controller.is_controlling());
  }

  #[tokio::test]
  async fn test_install_fails_when_offline() {
    let f = fixture();
    f.network.set_offline(true);

    let err = f.controller.install().await.unwrap_err();
    assert!(matches!(err, OfflineError::ManifestFetch { .. }));
    assert!(f.storage.entries("v5").unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_single_active_generation() {
    let f = fixture();
    f.storage.open_generation("v4").unwrap();
    f.controller.install().await.unwrap();

    let evicted = f.controller.activate();
    assert_eq!(evicted, vec!["v4"]);
    assert_eq!(f.storage.generations().unwrap(), vec!["v5"]);
    assert!(f.controller.is_controlling());
  }

  #[tokio::test]
  async fn test_eviction_tolerates_delete_failure() {
    let f = fixture();
    f.storage.open_generation("v3").unwrap();
    f.storage.open_generation("v4").unwrap();
    f.storage.fail_delete("v3");
    f.controller.install().await.unwrap();

    let evicted = f.controller.activate();
    assert_eq!(evicted, vec!["v4"]);
    assert_eq!(f.storage.generations().unwrap(), vec!["v3", "v5"]);
    assert_eq!(f.controller.state(), LifecycleState::Activated);
  }

  #[tokio::test]
  async fn test_non_get_passthrough() {
    let f = active_offline_fixture().await;
    let before = f.storage.entries("v5").unwrap();
    let calls = f.network.calls();

    for method in [Method::POST, Method::PUT, Method::DELETE] {
      let req = InterceptedRequest::get(url("./offline.html")).with_method(method);
      assert_eq!(f.controller.classify(&req), Strategy::Passthrough);
      assert!(matches!(
        f.controller.route(&req).await.unwrap(),
        Routed::Passthrough
      ));
    }
    assert_eq!(f.network.calls(), calls);
    assert_eq!(f.storage.entries("v5").unwrap(), before);
  }

  #[tokio::test]
  async fn test_cross_origin_passthrough() {
    let f = active_offline_fixture().await;
    let calls = f.network.calls();

    let cdn = Url::parse("https://cdn.example.com/model.bin").unwrap();
    let plain = InterceptedRequest::get(cdn.clone());
    let html = InterceptedRequest::get(cdn.clone())
      .with_navigate(true)
      .with_header("Accept", "text/html");
    let post = InterceptedRequest::get(cdn).with_method(Method::POST);

    for req in [plain, html, post] {
      assert!(matches!(
        f.controller.route(&req).await.unwrap(),
        Routed::Passthrough
      ));
    }
    assert_eq!(f.network.calls(), calls);
  }

  #[tokio::test]
  async fn test_same_host_other_port_is_cross_origin() {
    let f = active_offline_fixture().await;
    let req = InterceptedRequest::get(Url::parse("http://app.test:8443/app.js").unwrap());
    assert_eq!(f.controller.classify(&req), Strategy::Passthrough);
  }

  #[tokio::test]
  async fn test_classification() {
    let f = active_offline_fixture().await;

    assert_eq!(
      f.controller.classify(&navigation("/")),
      Strategy::NetworkFirst
    );
    assert_eq!(
      f.controller.classify(
        &InterceptedRequest::get(url("/about")).with_header("Accept", "text/html")
      ),
      Strategy::NetworkFirst
    );
    assert_eq!(
      f.controller.classify(&InterceptedRequest::get(url("/app.js"))),
      Strategy::CacheFirst
    );
  }

  #[tokio::test]
  async fn test_not_intercepting_before_activation() {
    let f = fixture();
    f.controller.install().await.unwrap();

    let req = InterceptedRequest::get(url("./offline.html"));
    assert_eq!(f.controller.classify(&req), Strategy::Passthrough);
  }

  #[tokio::test]
  async fn test_html_freshness() {
    let f = fixture();
    f.controller.install().await.unwrap();
    f.controller.activate();
    f.storage
      .put(
        "v5",
        &RequestKey::get(&url("/")),
        &Response::new(200).with_body("old shell"),
      )
      .unwrap();
    f.network.serve(url("/").as_str(), Response::new(200).with_body("new shell"));

    let routed = f.controller.route(&navigation("/")).await.unwrap();
    match routed {
      Routed::Respond(result) => {
        assert_eq!(result.source, CacheSource::Network);
        assert_eq!(result.data.body, b"new shell");
      }
      Routed::Passthrough => panic!("navigation not intercepted"),
    }

    assert!(
      eventually(|| {
        f.storage
          .get("v5", &RequestKey::get(&url("/")))
          .unwrap()
          .is_some_and(|e| e.response.body == b"new shell")
      })
      .await
    );
  }

  #[tokio::test]
  async fn test_offline_navigation_prefers_index() {
    let f = active_offline_fixture().await;
    f.storage
      .put(
        "v5",
        &RequestKey::get(&url("./index.html")),
        &Response::new(200).with_body("shell"),
      )
      .unwrap();

    let routed = f.controller.route(&navigation("/loans/42")).await.unwrap();
    assert_eq!(body(routed), b"shell");
  }

  #[tokio::test]
  async fn test_offline_fallback_chain() {
    let f = active_offline_fixture().await;

    let routed = f.controller.route(&navigation("/loans/42")).await.unwrap();
    match routed {
      Routed::Respond(result) => {
        assert_eq!(result.source, CacheSource::Fallback);
        assert_eq!(result.data.body, b"offline");
      }
      Routed::Passthrough => panic!("navigation not intercepted"),
    }
  }

  #[tokio::test]
  async fn test_offline_navigation_without_documents_fails() {
    let f = active_offline_fixture().await;
    f.storage.delete_generation("v5").unwrap();

    let err = f.controller.route(&navigation("/")).await.unwrap_err();
    assert!(matches!(err, OfflineError::NoOfflineContent { .. }));
  }

  #[tokio::test]
  async fn test_cache_first_hit() {
    let f = fixture();
    f.controller.install().await.unwrap();
    f.controller.activate();
    f.storage
      .put(
        "v5",
        &RequestKey::get(&url("/app.js")),
        &Response::new(200).with_body("cached js"),
      )
      .unwrap();
    f.network.serve(url("/app.js").as_str(), Response::new(200).with_body("live js"));
    let calls = f.network.calls();

    let routed = f
      .controller
      .route(&InterceptedRequest::get(url("/app.js")))
      .await
      .unwrap();
    assert_eq!(body(routed), b"cached js");
    assert_eq!(f.network.calls(), calls);
  }

  #[tokio::test]
  async fn test_cache_first_miss_is_cached() {
    let f = fixture();
    f.controller.install().await.unwrap();
    f.controller.activate();
    f.network.serve(url("/app.css").as_str(), Response::new(200).with_body("css"));

    let routed = f
      .controller
      .route(&InterceptedRequest::get(url("/app.css")))
      .await
      .unwrap();
    assert_eq!(body(routed), b"css");

    f.network.set_offline(true);
    assert!(
      eventually(|| {
        f.storage
          .get("v5", &RequestKey::get(&url("/app.css")))
          .unwrap()
          .is_some()
      })
      .await
    );
    let routed = f
      .controller
      .route(&InterceptedRequest::get(url("/app.css")))
      .await
      .unwrap();
    assert_eq!(body(routed), b"css");
  }

  #[tokio::test]
  async fn test_cache_first_offline_serves_offline_document() {
    let f = active_offline_fixture().await;

    let routed = f
      .controller
      .route(&InterceptedRequest::get(url("/chart.js")))
      .await
      .unwrap();
    assert_eq!(body(routed), b"offline");
  }

  #[tokio::test]
  async fn test_total_failure() {
    let f = active_offline_fixture().await;
    f.storage.delete_generation("v5").unwrap();

    let err = f
      .controller
      .route(&InterceptedRequest::get(url("/chart.js")))
      .await
      .unwrap_err();
    match err {
      OfflineError::NoOfflineContent { url } => assert!(url.ends_with("/chart.js")),
      other => panic!("unexpected error {:?}", other),
    }
  }

  #[test]
  fn test_control_signal_parse() {
    assert_eq!(
      ControlSignal::parse("SKIP_WAITING"),
      Some(ControlSignal::SkipWaiting)
    );
    assert_eq!(
      ControlSignal::parse(" \"SKIP_WAITING\"\n"),
      Some(ControlSignal::SkipWaiting)
    );
    assert_eq!(ControlSignal::parse("skip_waiting"), None);
    assert_eq!(ControlSignal::parse("{\"type\":\"SKIP_WAITING\"}"), None);
  }

  #[tokio::test]
  async fn test_first_install_does_not_wait() {
    let mut opts = options("v5");
    opts.eager_takeover = false;
    let f = fixture_with(opts);
    f.controller.install().await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), f.controller.wait_until_activatable())
      .await
      .expect("first install should activate immediately");
  }

  #[tokio::test]
  async fn test_update_waits_for_skip_waiting() {
    let mut opts = options("v6");
    opts.eager_takeover = false;
    let f = fixture_with(opts);
    f.storage.open_generation("v5").unwrap();
    f.controller.install().await.unwrap();

    let pending =
      tokio::time::timeout(Duration::from_millis(50), f.controller.wait_until_activatable()).await;
    assert!(pending.is_err());

    f.controller.handle_control_signal("hello");
    let pending =
      tokio::time::timeout(Duration::from_millis(50), f.controller.wait_until_activatable()).await;
    assert!(pending.is_err());

    f.controller.handle_control_signal("SKIP_WAITING");
    tokio::time::timeout(Duration::from_secs(1), f.controller.wait_until_activatable())
      .await
      .expect("skip waiting should release activation");
  }

  #[tokio::test]
  async fn test_waiting_update_does_not_intercept() {
    let mut opts = options("v6");
    opts.eager_takeover = false;
    let f = fixture_with(opts);
    f.storage.open_generation("v5").unwrap();
    f.controller.install().await.unwrap();
    f.network.set_offline(true);

    let req = navigation("/loans/42");
    assert_eq!(f.controller.classify(&req), Strategy::Passthrough);
    assert!(matches!(
      f.controller.route(&req).await.unwrap(),
      Routed::Passthrough
    ));
    assert_eq!(f.controller.state(), LifecycleState::Installed);
  }

  #[tokio::test]
  async fn test_eager_takeover_skips_waiting() {
    let f = fixture_with(options("v6"));
    f.storage.open_generation("v5").unwrap();
    f.controller.install().await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), f.controller.wait_until_activatable())
      .await
      .expect("eager takeover should not wait");
  }

  #[tokio::test]
  async fn test_restore_reuses_complete_generation() {
    let first = fixture();
    first.controller.install().await.unwrap();

    let network = Arc::new(FakeNetwork::new());
    network.set_offline(true);
    let second =
      OfflineCacheController::new(options("v5"), Arc::clone(&first.storage), Arc::clone(&network));

    assert!(second.restore().unwrap());
    assert_eq!(second.state(), LifecycleState::Installed);
    assert_eq!(network.calls(), 0);
  }

  #[tokio::test]
  async fn test_restore_rejects_incomplete_generation() {
    let f = fixture();
    assert!(!f.controller.restore().unwrap());

    f.storage
      .put(
        "v5",
        &RequestKey::get(&url("./offline.html")),
        &Response::new(200),
      )
      .unwrap();
    assert!(!f.controller.restore().unwrap());
    assert_eq!(f.controller.state(), LifecycleState::Parsed);
  }

  #[tokio::test]
  async fn test_forward_uses_network() {
    let f = fixture();
    f.network.serve(url("/api/loans").as_str(), Response::new(201));

    let req = InterceptedRequest::get(url("/api/loans")).with_method(Method::POST);
    let response = f.controller.forward(&req).await.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(f.network.seen(), vec!["POST http://app.test/api/loans"]);
  }
}

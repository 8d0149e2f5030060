//! Fakes shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use url::Url;

use crate::cache::{CacheStorage, CachedEntry, SqliteStorage};
use crate::controller::{ControllerOptions, OfflineCacheController};
use crate::http::{Fetcher, InterceptedRequest, RequestKey, Response};

pub const ORIGIN: &str = "http://app.test";

pub type TestController = OfflineCacheController<FlakyStorage, FakeNetwork>;

/// Absolute URL on the test origin.
pub fn app_url(path: &str) -> Url {
  Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Three-entry manifest that includes the offline document.
pub fn test_options(version: &str) -> ControllerOptions {
  ControllerOptions {
    version: version.to_string(),
    origin: app_url("/"),
    manifest: vec![
      app_url("./manifest.webmanifest"),
      app_url("./icon-192.png"),
      app_url("./offline.html"),
    ],
    index_document: app_url("./index.html"),
    offline_document: app_url("./offline.html"),
    eager_takeover: true,
  }
}

/// Network that serves every entry of `test_options`' manifest.
pub fn manifest_network() -> FakeNetwork {
  let network = FakeNetwork::new();
  network.serve(
    app_url("manifest.webmanifest").as_str(),
    Response::new(200).with_body("{}"),
  );
  network.serve(
    app_url("icon-192.png").as_str(),
    Response::new(200).with_body("png"),
  );
  network.serve(
    app_url("offline.html").as_str(),
    Response::new(200)
      .with_header("Content-Type", "text/html")
      .with_body("offline"),
  );
  network
}

/// Fresh controller over in-memory storage and the manifest network.
pub fn test_controller(
  options: ControllerOptions,
) -> (Arc<TestController>, Arc<FakeNetwork>, Arc<FlakyStorage>) {
  let network = Arc::new(manifest_network());
  let storage = Arc::new(FlakyStorage::new());
  let controller = Arc::new(OfflineCacheController::new(
    options,
    Arc::clone(&storage),
    Arc::clone(&network),
  ));
  (controller, network, storage)
}

/// Poll `check` until it holds, letting detached cache writes settle.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
  for _ in 0..100 {
    if check() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  check()
}

/// In-memory network keyed by URL, with an offline switch and a call log.
#[derive(Default)]
pub struct FakeNetwork {
  routes: Mutex<HashMap<String, Response>>,
  offline: AtomicBool,
  calls: AtomicUsize,
  seen: Mutex<Vec<String>>,
}

impl FakeNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn serve(&self, url: &str, response: Response) {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), response);
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  /// `METHOD URL` of every request seen, in order.
  pub fn seen(&self) -> Vec<String> {
    self.seen.lock().unwrap().clone()
  }
}

impl Fetcher for FakeNetwork {
  async fn fetch(&self, request: &InterceptedRequest) -> Result<Response> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .seen
      .lock()
      .unwrap()
      .push(format!("{} {}", request.method, request.url));

    if self.offline.load(Ordering::SeqCst) {
      return Err(eyre!("network unreachable"));
    }

    let mut url = request.url.clone();
    url.set_fragment(None);
    Ok(
      self
        .routes
        .lock()
        .unwrap()
        .get(url.as_str())
        .cloned()
        .unwrap_or_else(|| Response::new(404).with_body("not found")),
    )
  }
}

/// SQLite storage that refuses to delete selected generations.
pub struct FlakyStorage {
  inner: SqliteStorage,
  undeletable: Mutex<HashSet<String>>,
}

impl FlakyStorage {
  pub fn new() -> Self {
    Self {
      inner: SqliteStorage::open_in_memory().unwrap(),
      undeletable: Mutex::new(HashSet::new()),
    }
  }

  pub fn fail_delete(&self, tag: &str) {
    self.undeletable.lock().unwrap().insert(tag.to_string());
  }
}

impl CacheStorage for FlakyStorage {
  fn open_generation(&self, tag: &str) -> Result<()> {
    self.inner.open_generation(tag)
  }

  fn generations(&self) -> Result<Vec<String>> {
    self.inner.generations()
  }

  fn delete_generation(&self, tag: &str) -> Result<bool> {
    if self.undeletable.lock().unwrap().contains(tag) {
      return Err(eyre!("disk I/O error deleting {}", tag));
    }
    self.inner.delete_generation(tag)
  }

  fn put(&self, tag: &str, key: &RequestKey, response: &Response) -> Result<()> {
    self.inner.put(tag, key, response)
  }

  fn put_all(&self, tag: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    self.inner.put_all(tag, entries)
  }

  fn get(&self, tag: &str, key: &RequestKey) -> Result<Option<CachedEntry>> {
    self.inner.get(tag, key)
  }

  fn entries(&self, tag: &str) -> Result<Vec<String>> {
    self.inner.entries(tag)
  }
}

//! Cache layer that applies the two fetch strategies to one cache generation.

use std::future::Future;
use std::sync::Arc;

use color_eyre::Result;
use tracing::{debug, warn};

use super::storage::{CacheStorage, CachedEntry};
use super::traits::CacheResult;
use crate::error::OfflineError;
use crate::http::{RequestKey, Response};

/// Cache layer bound to a single generation.
///
/// Reads happen inline; writes after a network success are detached
/// background tasks so the caller never waits on them.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  generation: String,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a cache layer over `generation` of the given storage backend.
  pub fn new(storage: Arc<S>, generation: impl Into<String>) -> Self {
    Self {
      storage,
      generation: generation.into(),
    }
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  /// Look up a stored response. Read errors count as a miss.
  pub fn lookup(&self, key: &RequestKey) -> Option<CachedEntry> {
    match self.storage.get(&self.generation, key) {
      Ok(entry) => entry,
      Err(e) => {
        warn!("Cache read failed for {}: {}", key.description(), e);
        None
      }
    }
  }

  /// Store a copy of `response` in the background.
  ///
  /// Failures are logged and otherwise ignored; a crash before the write
  /// commits loses the update.
  pub fn store_detached(&self, key: RequestKey, response: Response) {
    if response.is_partial() {
      debug!("Not caching partial response for {}", key.description());
      return;
    }

    let storage = Arc::clone(&self.storage);
    let generation = self.generation.clone();
    tokio::task::spawn_blocking(move || {
      if let Err(e) = storage.put(&generation, &key, &response) {
        warn!("Failed to cache {}: {}", key.description(), e);
      }
    });
  }

  /// Write a batch in one transaction (install-time pre-caching).
  pub fn store_all(&self, entries: &[(RequestKey, Response)]) -> Result<()> {
    self.storage.put_all(&self.generation, entries)
  }

  /// Fetch with network-first strategy.
  ///
  /// 1. Fetch from network; on success cache a copy and return the live response
  /// 2. On failure serve the first fallback document found in the cache
  /// 3. Otherwise fail with `NoOfflineContent`
  pub async fn network_first<F, Fut>(
    &self,
    key: &RequestKey,
    fallbacks: &[&RequestKey],
    fetcher: F,
  ) -> Result<CacheResult<Response>, OfflineError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Response>>,
  {
    match fetcher().await {
      Ok(response) => {
        self.store_detached(key.clone(), response.clone());
        Ok(CacheResult::from_network(response))
      }
      Err(e) => {
        debug!("Network failed for {}: {}", key.description(), e);
        self
          .first_fallback(fallbacks)
          .ok_or_else(|| OfflineError::NoOfflineContent {
            url: key.url().to_string(),
          })
      }
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Check cache; a hit is returned without touching the network
  /// 2. On a miss fetch, cache a copy and return the live response
  /// 3. On network failure serve the fallback document if cached
  /// 4. Otherwise fail with `NoOfflineContent`
  pub async fn cache_first<F, Fut>(
    &self,
    key: &RequestKey,
    fallback: &RequestKey,
    fetcher: F,
  ) -> Result<CacheResult<Response>, OfflineError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Response>>,
  {
    if let Some(cached) = self.lookup(key) {
      return Ok(CacheResult::from_cache(cached.response, cached.cached_at));
    }

    match fetcher().await {
      Ok(response) => {
        self.store_detached(key.clone(), response.clone());
        Ok(CacheResult::from_network(response))
      }
      Err(e) => {
        debug!("Network failed for {}: {}", key.description(), e);
        self
          .first_fallback(&[fallback])
          .ok_or_else(|| OfflineError::NoOfflineContent {
            url: key.url().to_string(),
          })
      }
    }
  }

  fn first_fallback(&self, keys: &[&RequestKey]) -> Option<CacheResult<Response>> {
    keys.iter().find_map(|key| {
      self
        .lookup(key)
        .map(|entry| CacheResult::fallback(entry.response, entry.cached_at))
    })
  }
}

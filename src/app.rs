use std::sync::Arc;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};

use crate::cache::{CacheStorage, SqliteStorage};
use crate::config::Config;
use crate::controller::{ControllerOptions, OfflineCacheController};
use crate::error::OfflineError;
use crate::event::{EventHandler, WorkerEvent};
use crate::http::{Fetcher, NetworkClient};
use crate::server;

pub type Controller = OfflineCacheController<SqliteStorage, NetworkClient>;

/// How often a failed install is retried before startup is aborted
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub retries: u32,
  pub delay: Duration,
}

/// Main application: storage, network client, controller and HTTP front end
pub struct App {
  config: Config,
  storage: Arc<SqliteStorage>,
  controller: Arc<Controller>,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let storage = Arc::new(SqliteStorage::open(&config.database_path()?)?);
    let network = Arc::new(NetworkClient::new(&config)?);
    let options = ControllerOptions::from_config(&config)?;
    let controller = Arc::new(OfflineCacheController::new(
      options,
      Arc::clone(&storage),
      network,
    ));

    Ok(Self {
      config,
      storage,
      controller,
    })
  }

  fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      retries: self.config.cache.install_retries,
      delay: Duration::from_secs(self.config.cache.retry_delay_secs),
    }
  }

  /// Serve until the server stops or the install fails for good.
  pub async fn run(self) -> Result<()> {
    let events = EventHandler::new();
    let tx = events.sender();
    tx.send(WorkerEvent::Install)
      .map_err(|_| eyre!("Lifecycle channel closed"))?;

    let server = server::serve(&self.config.server, Arc::clone(&self.controller), tx)?;
    let handle = server.handle();
    let lifecycle = tokio::spawn(run_lifecycle(
      Arc::clone(&self.controller),
      events,
      self.retry_policy(),
    ));

    tokio::select! {
      res = server => res.map_err(|e| eyre!("Server error: {}", e))?,
      res = lifecycle => {
        handle.stop(true).await;
        res.map_err(|e| eyre!("Lifecycle task failed: {}", e))??;
      }
    }

    Ok(())
  }

  /// Install and activate the current version once, without serving.
  pub async fn install(&self) -> Result<()> {
    install_with_retry(&self.controller, &self.retry_policy()).await?;
    let evicted = self.controller.activate();
    info!(
      "Cache generation {} ready ({} stale generations removed)",
      self.controller.version(),
      evicted.len()
    );
    Ok(())
  }

  /// Print stored generations and their entries.
  pub fn print_status(&self) -> Result<()> {
    let generations = self.storage.generations()?;
    if generations.is_empty() {
      println!("No cache generations stored");
      return Ok(());
    }

    for tag in generations {
      let marker = if tag == self.controller.version() {
        " (current)"
      } else {
        " (stale)"
      };
      let entries = self.storage.entries(&tag)?;
      println!("{}{}: {} entries", tag, marker, entries.len());
      for entry in entries {
        println!("  {}", entry);
      }
    }
    Ok(())
  }
}

/// Drain lifecycle events and dispatch them to the controller.
///
/// Returns only if the install fails for good (or the channel closes).
pub async fn run_lifecycle<S: CacheStorage, F: Fetcher>(
  controller: Arc<OfflineCacheController<S, F>>,
  mut events: EventHandler,
  policy: RetryPolicy,
) -> Result<(), OfflineError> {
  let tx = events.sender();

  while let Some(event) = events.next().await {
    match event {
      WorkerEvent::Install => {
        install_with_retry(&controller, &policy).await?;

        let controller = Arc::clone(&controller);
        let tx = tx.clone();
        tokio::spawn(async move {
          controller.wait_until_activatable().await;
          let _ = tx.send(WorkerEvent::Activate);
        });
      }
      WorkerEvent::Activate => {
        controller.activate();
      }
      WorkerEvent::Message(payload) => controller.handle_control_signal(&payload),
    }
  }

  Ok(())
}

/// Reuse a complete generation if there is one, else install with retries.
pub async fn install_with_retry<S: CacheStorage, F: Fetcher>(
  controller: &OfflineCacheController<S, F>,
  policy: &RetryPolicy,
) -> Result<(), OfflineError> {
  if controller.restore()? {
    return Ok(());
  }

  let mut attempt = 0;
  loop {
    match controller.install().await {
      Ok(()) => return Ok(()),
      Err(e @ OfflineError::ManifestFetch { .. }) if attempt < policy.retries => {
        attempt += 1;
        warn!(
          "Install attempt {} of {} failed: {}",
          attempt,
          policy.retries + 1,
          e
        );
        tokio::time::sleep(policy.delay).await;
      }
      Err(e) => return Err(e),
    }
  }
}

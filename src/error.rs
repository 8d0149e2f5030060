use thiserror::Error;

/// Failures that escape the controller.
///
/// Network and stale-generation failures are handled where they happen and
/// never show up here.
#[derive(Debug, Error)]
pub enum OfflineError {
  /// A manifest URL could not be fetched (or answered with a non-2xx
  /// status); the install did not complete.
  #[error("failed to pre-cache {url}: {reason}")]
  ManifestFetch { url: String, reason: String },

  /// No network, no cached entry and no fallback document.
  #[error("no offline content for {url}")]
  NoOfflineContent { url: String },

  #[error("cache storage error: {0}")]
  Storage(color_eyre::Report),
}

impl From<color_eyre::Report> for OfflineError {
  fn from(err: color_eyre::Report) -> Self {
    OfflineError::Storage(err)
  }
}

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub app: AppConfig,
  pub cache: CacheConfig,
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Public origin the browser sees (e.g. "http://localhost:8080")
  pub origin: Url,
  /// Application server requests are forwarded to
  pub upstream: Url,
  /// Base path relative URLs resolve against
  #[serde(default = "default_scope")]
  pub scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Cache generation tag; bump it whenever cached assets change
  pub version: String,
  /// Relative URLs pre-cached on install
  #[serde(default)]
  pub manifest: Vec<String>,
  #[serde(default = "default_index_document")]
  pub index_document: String,
  #[serde(default = "default_offline_document")]
  pub offline_document: String,
  /// Activate as soon as install succeeds instead of waiting for SKIP_WAITING.
  ///
  /// With `false`, an update that finds an older generation stays
  /// `Installed` until SKIP_WAITING arrives. Nothing serves the older
  /// generation in the meantime, so every request goes straight to the
  /// upstream and offline fallbacks are unavailable until the signal.
  #[serde(default = "default_true")]
  pub eager_takeover: bool,
  /// SQLite database path (defaults to the user data directory)
  pub database: Option<PathBuf>,
  #[serde(default)]
  pub install_retries: u32,
  #[serde(default = "default_retry_delay_secs")]
  pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_listen")]
  pub listen: String,
  /// POST endpoint for control messages such as SKIP_WAITING
  #[serde(default = "default_control_path")]
  pub control_path: String,
  #[serde(default = "default_network_timeout_secs")]
  pub network_timeout_secs: u64,
  /// Largest request body accepted (and forwarded upstream)
  #[serde(default = "default_max_body_bytes")]
  pub max_body_bytes: usize,
  /// Forward absolute-form requests for other hosts instead of refusing them
  #[serde(default)]
  pub forward_proxy: bool,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      listen: default_listen(),
      control_path: default_control_path(),
      network_timeout_secs: default_network_timeout_secs(),
      max_body_bytes: default_max_body_bytes(),
      forward_proxy: false,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Filter used when RUST_LOG is unset
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Directory for a daily rolling log file
  pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      directory: None,
    }
  }
}

fn default_scope() -> String {
  "/".to_string()
}

fn default_index_document() -> String {
  "./index.html".to_string()
}

fn default_offline_document() -> String {
  "./offline.html".to_string()
}

fn default_true() -> bool {
  true
}

fn default_retry_delay_secs() -> u64 {
  5
}

fn default_listen() -> String {
  "127.0.0.1:8080".to_string()
}

fn default_control_path() -> String {
  "/__pwa-offline/message".to_string()
}

fn default_network_timeout_secs() -> u64 {
  30
}

fn default_max_body_bytes() -> usize {
  64 * 1024 * 1024
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pwa-offline.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pwa-offline/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/pwa-offline/config.yaml\n\
                 See pwa-offline.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("pwa-offline.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pwa-offline").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.version.trim().is_empty() {
      return Err(eyre!("cache.version must not be empty"));
    }
    if !self.app.origin.has_host() {
      return Err(eyre!("app.origin must be an absolute http(s) URL"));
    }
    if !self.server.control_path.starts_with('/') {
      return Err(eyre!("server.control_path must start with '/'"));
    }
    self.scope_url()?;
    Ok(())
  }

  /// Origin plus scope; every relative URL in the config resolves against it.
  pub fn scope_url(&self) -> Result<Url> {
    let mut scope = self.app.scope.clone();
    if !scope.ends_with('/') {
      scope.push('/');
    }
    self
      .app
      .origin
      .join(&scope)
      .map_err(|e| eyre!("Invalid app.scope '{}': {}", self.app.scope, e))
  }

  /// Resolve a relative URL against the scope.
  pub fn resolve(&self, relative: &str) -> Result<Url> {
    self
      .scope_url()?
      .join(relative)
      .map_err(|e| eyre!("Invalid URL '{}': {}", relative, e))
  }

  /// Get the default database path.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.cache.database {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pwa-offline").join("cache.db"))
  }
}

mod app;
mod cache;
mod config;
mod controller;
mod error;
mod event;
mod http;
mod server;
#[cfg(test)]
mod testing;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

#[derive(Parser, Debug)]
#[command(name = "pwa-offline")]
#[command(about = "An offline-first caching proxy for progressive web apps")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./pwa-offline.yaml, then $XDG_CONFIG_HOME/pwa-offline/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Cache version tag to use instead of the configured one
  #[arg(long)]
  cache_version: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Install, activate and serve the proxy (default)
  Serve,
  /// Pre-cache the manifest and activate, then exit
  Install,
  /// List stored cache generations
  Status,
}

/// Log to stderr, plus a daily rolling file when a directory is configured.
/// RUST_LOG overrides the configured level.
fn init_tracing(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&config.level))
    .map_err(|e| eyre!("Invalid log level {:?}: {}", config.level, e))?;

  let (file_layer, guard) = match &config.directory {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "pwa-offline.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = fmt::layer().with_writer(writer).with_ansi(false);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(io::stderr))
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

#[actix_web::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;

  // Override the cache version if specified on command line
  let config = match args.cache_version {
    Some(version) if !version.trim().is_empty() => config::Config {
      cache: config::CacheConfig {
        version,
        ..config.cache
      },
      ..config
    },
    Some(_) => return Err(eyre!("--cache-version must not be empty")),
    None => config,
  };

  let _guard = init_tracing(&config.log)?;
  info!(
    version = %config.cache.version,
    origin = %config.app.origin,
    "pwa-offline starting"
  );

  let app = app::App::new(config)?;
  match args.command.unwrap_or(Command::Serve) {
    Command::Serve => app.run().await?,
    Command::Install => app.install().await?,
    Command::Status => app.print_status()?,
  }

  Ok(())
}

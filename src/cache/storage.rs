//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::http::{RequestKey, Response};

/// A single stored response.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub response: Response,
  /// When the response was stored
  pub cached_at: DateTime<Utc>,
}

/// Persistent set of named cache generations.
///
/// Each generation is an independent request → response map. Writing into a
/// generation that does not exist creates it.
pub trait CacheStorage: Send + Sync + 'static {
  /// Create the generation if it is missing.
  fn open_generation(&self, tag: &str) -> Result<()>;

  /// All generation tags, oldest first.
  fn generations(&self) -> Result<Vec<String>>;

  /// Delete a generation and everything in it. Returns false if it did not exist.
  fn delete_generation(&self, tag: &str) -> Result<bool>;

  /// Store (or replace) one response.
  fn put(&self, tag: &str, key: &RequestKey, response: &Response) -> Result<()>;

  /// Store several responses; either all are written or none are.
  fn put_all(&self, tag: &str, entries: &[(RequestKey, Response)]) -> Result<()>;

  /// Look up a stored response.
  fn get(&self, tag: &str, key: &RequestKey) -> Result<Option<CachedEntry>>;

  /// Request descriptions stored in a generation, in insertion order.
  fn entries(&self, tag: &str) -> Result<Vec<String>>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Non-persistent storage, used by tests.
  #[allow(dead_code)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generations (
    tag TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per stored response
CREATE TABLE IF NOT EXISTS entries (
    tag TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (tag, key_hash),
    FOREIGN KEY (tag) REFERENCES generations(tag) ON DELETE CASCADE
);
"#;

fn insert_generation(conn: &Connection, tag: &str) -> Result<()> {
  conn
    .execute(
      "INSERT OR IGNORE INTO generations (tag) VALUES (?)",
      params![tag],
    )
    .map_err(|e| eyre!("Failed to open cache generation {}: {}", tag, e))?;
  Ok(())
}

fn insert_entry(conn: &Connection, tag: &str, key: &RequestKey, response: &Response) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO entries (tag, key_hash, method, url, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        tag,
        key.cache_hash(),
        key.method(),
        key.url().as_str(),
        response.status,
        headers,
        response.body
      ],
    )
    .map_err(|e| eyre!("Failed to store {}: {}", key.description(), e))?;

  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn open_generation(&self, tag: &str) -> Result<()> {
    let conn = self.lock()?;
    insert_generation(&conn, tag)
  }

  fn generations(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT tag FROM generations ORDER BY created_at, rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let tags = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache generations: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache generation: {}", e))?;

    Ok(tags)
  }

  fn delete_generation(&self, tag: &str) -> Result<bool> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM entries WHERE tag = ?", params![tag])
      .map_err(|e| eyre!("Failed to delete entries of {}: {}", tag, e))?;
    let deleted = tx
      .execute("DELETE FROM generations WHERE tag = ?", params![tag])
      .map_err(|e| eyre!("Failed to delete cache generation {}: {}", tag, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(deleted > 0)
  }

  fn put(&self, tag: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    insert_generation(&tx, tag)?;
    insert_entry(&tx, tag, key, response)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn put_all(&self, tag: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    let mut conn = self.lock()?;
    // Dropping the transaction on an early return rolls everything back
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    insert_generation(&tx, tag)?;
    for (key, response) in entries {
      insert_entry(&tx, tag, key, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn get(&self, tag: &str, key: &RequestKey) -> Result<Option<CachedEntry>> {
    let conn = self.lock()?;

    let row: Option<(u16, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT status, headers, body, cached_at FROM entries
         WHERE tag = ? AND key_hash = ?",
        params![tag, key.cache_hash()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", key.description(), e))?;

    match row {
      Some((status, headers, body, cached_at_str)) => {
        let headers = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntry {
          response: Response {
            status,
            headers,
            body,
          },
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn entries(&self, tag: &str) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT method, url FROM entries WHERE tag = ? ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let entries = stmt
      .query_map(params![tag], |row| {
        let method: String = row.get(0)?;
        let url: String = row.get(1)?;
        Ok(format!("{} {}", method, url))
      })
      .map_err(|e| eyre!("Failed to list entries of {}: {}", tag, e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read entry: {}", e))?;

    Ok(entries)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

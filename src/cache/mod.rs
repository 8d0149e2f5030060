//! Versioned cache generations and the strategies that read and fill them.
//!
//! This module provides:
//! - Named cache generations persisted in SQLite (one per version tag)
//! - Network-first and cache-first lookups over a single generation
//! - Detached, best-effort writes after a network success

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, CachedEntry, SqliteStorage};
pub use traits::{CacheResult, CacheSource};

//! Local cache of sandbox analysis results
//!
//! SQLite-backed store keyed by artifact SHA-1, so repeat analyses of the
//! same sample skip the network entirely.

pub mod client;
pub mod key;
pub mod storage;

use std::path::PathBuf;

use crate::error::CacheError;

/// Default cache location (`~/.cache/vone/cache.sqlite3` on Linux)
pub fn default_path() -> Result<PathBuf, CacheError> {
    let base = dirs::cache_dir()
        .ok_or_else(|| CacheError::Io("Cannot determine cache directory".to_string()))?;
    Ok(base.join("vone").join("cache.sqlite3"))
}

pub use client::{CachedSandbox, PollSettings};
pub use key::ArtifactKey;
pub use storage::{CachedResult, ResultCache};

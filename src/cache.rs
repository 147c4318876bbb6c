//! Content-addressed result cache.
//!
//! Stores sealed [`DocumentResult`]s as JSON files named by
//! [`CacheKey::file_stem`]. Writes go through a unique temp file in the same
//! directory followed by a rename, so a crash mid-write can never leave a
//! half-written entry that a later lookup would try to parse. Any entry that
//! does fail to read or parse is treated as a miss, never an error: the
//! cache accelerates the pipeline, it never gates it.

use crate::identity::CacheKey;
use crate::output::DocumentResult;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from cache maintenance operations.
///
/// Lookup never returns these (a broken entry is a miss); only writes and
/// explicit maintenance calls do, and the orchestrator downgrades write
/// failures to a document warning.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot create cache directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cache write failed for '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cache entry serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk cache of sealed document results.
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
}

/// Counts returned by [`ContentCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

impl ContentCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    /// Look up a sealed result. Missing, unreadable, or unparseable entries
    /// are all misses.
    pub async fn get(&self, key: &CacheKey) -> Option<DocumentResult> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice::<DocumentResult>(&bytes) {
            Ok(result) => {
                debug!(path = %path.display(), pages = result.pages.len(), "cache hit");
                Some(result)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry, treating as miss");
                None
            }
        }
    }

    /// Store a sealed result atomically.
    ///
    /// The temp name embeds pid and a nanosecond timestamp so concurrent
    /// writers for the same key cannot collide on the intermediate file;
    /// whichever rename lands last wins, and both wrote the same content.
    pub async fn put(&self, key: &CacheKey, result: &DocumentResult) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let json = serde_json::to_vec_pretty(result)?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let tmp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            key.file_stem(),
            std::process::id(),
            nanos
        ));

        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|source| CacheError::Write {
                path: tmp.clone(),
                source,
            })?;
        if let Err(source) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::Write { path, source });
        }
        debug!(path = %path.display(), bytes = json.len(), "cache entry written");
        Ok(())
    }

    /// Remove the entry for `key` if present. Removing a missing entry is
    /// not an error.
    pub async fn invalidate(&self, key: &CacheKey) {
        let path = self.entry_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "cache entry invalidated"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "cache invalidation failed"),
        }
    }

    /// Count entries and total bytes on disk.
    pub async fn stats(&self) -> Result<CacheStats, std::io::Error> {
        let mut stats = CacheStats::default();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            stats.entries += 1;
            if let Ok(meta) = entry.metadata().await {
                stats.total_bytes += meta.len();
            }
        }
        Ok(stats)
    }

    /// Delete every cache entry. Returns the number removed.
    pub async fn clear(&self) -> Result<usize, std::io::Error> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // Leftover temp files from interrupted writes are fair game too.
            if path.extension().and_then(|e| e.to_str()) == Some("json")
                || (name.starts_with('.') && name.ends_with(".tmp"))
            {
                if tokio::fs::remove_file(&path).await.is_ok() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

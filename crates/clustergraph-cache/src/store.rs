//! Cache stores.
//!
//! Entries are whole `ClusteringOutput` documents: created on miss, read
//! on hit, never modified in place and only removed by [`CacheStore::clear`].

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use clustergraph_types::ClusteringOutput;

use crate::error::CacheError;
use crate::key::is_valid_key;

/// Key -> `ClusteringOutput` store.
///
/// Implementations must allow concurrent reads and concurrent writes to
/// distinct keys. Concurrent writes to one key may race; the last writer
/// wins, which is harmless since equal keys imply equal outputs.
pub trait CacheStore: Send + Sync {
    /// Read an entry, surfacing errors.
    fn try_get(&self, key: &str) -> Result<Option<ClusteringOutput>, CacheError>;

    /// Write an entry atomically, surfacing errors.
    fn try_put(&self, key: &str, output: &ClusteringOutput) -> Result<(), CacheError>;

    /// Remove every entry, returning how many were removed.
    fn clear(&self) -> Result<usize, CacheError>;

    /// Read an entry; any failure is logged and reported as a miss.
    fn get(&self, key: &str) -> Option<ClusteringOutput> {
        match self.try_get(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Unreadable cache entry, treating as miss");
                None
            }
        }
    }

    /// Write an entry; a failure is logged and otherwise ignored.
    fn put(&self, key: &str, output: &ClusteringOutput) {
        if let Err(e) = self.try_put(key, output) {
            warn!(key, error = %e, "Failed to write cache entry");
        }
    }
}

/// One pretty-printed `{key}.json` file per entry in a directory.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    /// Store rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        if !is_valid_key(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl CacheStore for FileCacheStore {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    fn try_get(&self, key: &str) -> Result<Option<ClusteringOutput>, CacheError> {
        let path = self.entry_path(key)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cache miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let output: ClusteringOutput = serde_json::from_str(&content)?;
        debug!(clusters = output.clusters.len(), "Cache hit");
        Ok(Some(output))
    }

    #[instrument(skip(self, output), fields(dir = %self.dir.display()))]
    fn try_put(&self, key: &str, output: &ClusteringOutput) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;
        fs::create_dir_all(&self.dir)?;

        // Write beside the target and rename, so readers never see a partial file
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, output)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path)?;

        debug!(path = %path.display(), "Saved result to cache");
        Ok(())
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    fn clear(&self) -> Result<usize, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_entry = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(is_valid_key);
            if is_entry {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }

        debug!(removed, "Cleared cache");
        Ok(removed)
    }
}

/// Process-local store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, ClusteringOutput>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn try_get(&self, key: &str) -> Result<Option<ClusteringOutput>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn try_put(&self, key: &str, output: &ClusteringOutput) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), output.clone());
        Ok(())
    }

    fn clear(&self) -> Result<usize, CacheError> {
        let removed = self.entries.len();
        self.entries.clear();
        Ok(removed)
    }
}

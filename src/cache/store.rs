//! File-backed cache store
//!
//! Each entry lives in `<root>/<kind>/<sha256(id)>.json`. Hashing the ID keeps
//! arbitrary identifiers from escaping the cache directory.

use crate::cache::{CacheError, CacheResult, ResourceKind};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cached API response together with the time it was fetched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub kind: String,
    pub id: String,
    pub fetched_at: DateTime<Utc>,
    pub payload: T,
}

impl<T> CacheEntry<T> {
    pub fn new(kind: ResourceKind, id: &str, payload: T) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            id: id.to_string(),
            fetched_at: Utc::now(),
            payload,
        }
    }

    /// Checks if the entry is older than the given time-to-live
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }

    /// Returns how long ago the entry was fetched
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}

/// Read/write switches and freshness window
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub ttl: Duration,

    /// Serve lookups from disk
    pub read: bool,

    /// Persist fetched responses
    pub write: bool,
}

impl CachePolicy {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds.min(i64::MAX as u64) as i64),
            read: true,
            write: true,
        }
    }

    /// Policy that never touches the disk
    pub fn disabled() -> Self {
        Self {
            ttl: Duration::zero(),
            read: false,
            write: false,
        }
    }
}

/// Durable cache of raw API payloads
///
/// Safe to share between fetch tasks: readers never see a half-written entry
/// because writes go to a temporary file that is renamed into place. Two writers
/// racing on the same key end with whichever rename happens last.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    policy: CachePolicy,
    tmp_counter: AtomicU64,
}

impl CacheStore {
    /// Creates a store rooted at `root`; the directory is created lazily
    pub fn new(root: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        Self {
            root: root.into(),
            policy,
            tmp_counter: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Path of the entry file for a key
    fn entry_path(&self, kind: ResourceKind, id: &str) -> PathBuf {
        let digest = Sha256::digest(id.as_bytes());
        self.root
            .join(kind.as_str())
            .join(format!("{}.json", hex::encode(digest)))
    }

    /// Reads an entry regardless of its age
    ///
    /// Unreadable or corrupt entries count as a miss; a corrupt file is removed
    /// so the next write replaces it cleanly.
    pub fn lookup<T: DeserializeOwned>(&self, kind: ResourceKind, id: &str) -> Option<CacheEntry<T>> {
        if !self.policy.read {
            return None;
        }

        let path = self.entry_path(kind, id);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Cannot read cache entry {} {}: {}", kind, id, e);
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry<T>>(&content) {
            Ok(entry) if entry.id == id => Some(entry),
            Ok(entry) => {
                tracing::warn!(
                    "Cache entry {} {} holds id {}, ignoring it",
                    kind,
                    id,
                    entry.id
                );
                None
            }
            Err(e) => {
                tracing::warn!("Corrupt cache entry {} {}: {}", kind, id, e);
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Returns the cached payload for a key, fresh or not
    pub fn get<T: DeserializeOwned>(&self, kind: ResourceKind, id: &str) -> Option<T> {
        self.lookup(kind, id).map(|entry| entry.payload)
    }

    /// Returns the cached payload only if it is inside the TTL window
    pub fn get_fresh<T: DeserializeOwned>(&self, kind: ResourceKind, id: &str) -> Option<T> {
        self.lookup(kind, id)
            .filter(|entry| !entry.is_stale(self.policy.ttl))
            .map(|entry| entry.payload)
    }

    /// Checks whether a usable, non-expired entry exists for a key
    pub fn is_fresh(&self, kind: ResourceKind, id: &str) -> bool {
        self.lookup::<serde::de::IgnoredAny>(kind, id)
            .map(|entry| !entry.is_stale(self.policy.ttl))
            .unwrap_or(false)
    }

    /// Stores a payload; failures are logged and otherwise ignored
    pub fn put<T: Serialize>(&self, kind: ResourceKind, id: &str, payload: &T) {
        if !self.policy.write {
            return;
        }

        if let Err(e) = self.write_entry(kind, id, payload) {
            tracing::warn!("Failed to cache {} {}: {}", kind, id, e);
        }
    }

    fn write_entry<T: Serialize>(&self, kind: ResourceKind, id: &str, payload: &T) -> std::io::Result<()> {
        let path = self.entry_path(kind, id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let entry = CacheEntry::new(kind, id, payload);
        let bytes = serde_json::to_vec(&entry)?;

        let tmp = path.with_extension(format!(
            "tmp-{}-{}",
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
    }

    /// Removes every entry and returns how many were removed
    pub fn clear(&self) -> CacheResult<usize> {
        let mut removed = 0;
        for kind in ResourceKind::ALL {
            let dir = self.root.join(kind.as_str());
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(&dir, e)),
            };

            for entry in entries {
                let path = entry.map_err(|e| io_error(&dir, e))?.path();
                if path.is_file() {
                    fs::remove_file(&path).map_err(|e| io_error(&path, e))?;
                    removed += 1;
                }
            }
        }

        tracing::info!("Removed {} cache entries from {}", removed, self.root.display());
        Ok(removed)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.display().to_string(),
        source,
    }
}

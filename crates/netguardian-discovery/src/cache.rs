//! Persistence of the last verified endpoint.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use netguardian_types::{CandidateEndpoint, PersistedEndpoint};
use tracing::{debug, warn};

use crate::error::DiscoveryError;

/// Durable single-value store for the last endpoint that passed a probe.
///
/// Reads never touch the network. There is no expiry: a stale entry is
/// discovered when its own probe fails.
///
/// [`DiscoveryController`](crate::DiscoveryController) calls `store` while it
/// holds its run lock, on an async worker, so that a superseded run can never
/// write. Implementations must finish quickly: a small local write is fine,
/// anything that can block for long (network storage, fsync on slow media) is
/// not.
pub trait EndpointCache: Send + Sync + 'static {
    fn load(&self) -> Result<Option<PersistedEndpoint>, DiscoveryError>;

    fn store(&self, persisted: &PersistedEndpoint) -> Result<(), DiscoveryError>;

    fn clear(&self) -> Result<(), DiscoveryError>;

    fn read(&self) -> Result<Option<CandidateEndpoint>, DiscoveryError> {
        Ok(self.load()?.map(|persisted| persisted.base_url))
    }

    /// Persist `endpoint`, stamped with the current time. Only call this
    /// after a probe against exactly `endpoint` succeeded.
    fn write(&self, endpoint: &CandidateEndpoint) -> Result<(), DiscoveryError> {
        self.store(&PersistedEndpoint {
            base_url: endpoint.clone(),
            verified_at: unix_now(),
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Cache backed by a small TOML file.
#[derive(Debug, Clone)]
pub struct FileEndpointCache {
    path: PathBuf,
}

impl FileEndpointCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EndpointCache for FileEndpointCache {
    fn load(&self) -> Result<Option<PersistedEndpoint>, DiscoveryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DiscoveryError::Cache(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        // A corrupt entry is a cache miss, not a fatal error.
        match toml::from_str::<PersistedEndpoint>(&content) {
            Ok(persisted) => Ok(Some(persisted)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring unreadable endpoint cache"
                );
                Ok(None)
            }
        }
    }

    fn store(&self, persisted: &PersistedEndpoint) -> Result<(), DiscoveryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DiscoveryError::Cache(format!("failed to create cache dir: {e}")))?;
        }

        let content = toml::to_string(persisted)
            .map_err(|e| DiscoveryError::Cache(format!("failed to encode endpoint: {e}")))?;

        // Write then rename, so a crash never leaves a half-written entry.
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| DiscoveryError::Cache(format!("failed to write cache: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| DiscoveryError::Cache(format!("failed to replace cache: {e}")))?;

        debug!(path = %self.path.display(), endpoint = %persisted.base_url, "endpoint cached");
        Ok(())
    }

    fn clear(&self) -> Result<(), DiscoveryError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DiscoveryError::Cache(format!("failed to clear cache: {e}"))),
        }
    }
}

/// In-process cache for tests and embedders without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryEndpointCache {
    inner: Mutex<MemoryCacheState>,
}

#[derive(Debug, Default)]
struct MemoryCacheState {
    entry: Option<PersistedEndpoint>,
    writes: usize,
}

impl MemoryEndpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache pre-seeded with `endpoint`. The seed is not counted as a write.
    pub fn with_endpoint(endpoint: CandidateEndpoint) -> Self {
        let cache = Self::new();
        cache.lock().entry = Some(PersistedEndpoint {
            base_url: endpoint,
            verified_at: 0,
        });
        cache
    }

    /// Number of `store` calls so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryCacheState> {
        // State is plain data, so a poisoned lock is still consistent.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl EndpointCache for MemoryEndpointCache {
    fn load(&self) -> Result<Option<PersistedEndpoint>, DiscoveryError> {
        Ok(self.lock().entry.clone())
    }

    fn store(&self, persisted: &PersistedEndpoint) -> Result<(), DiscoveryError> {
        let mut state = self.lock();
        state.entry = Some(persisted.clone());
        state.writes += 1;
        Ok(())
    }

    fn clear(&self) -> Result<(), DiscoveryError> {
        self.lock().entry = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> CandidateEndpoint {
        CandidateEndpoint::parse("http://192.168.1.77:49152").unwrap()
    }

    #[test]
    fn file_cache_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileEndpointCache::new(dir.path().join("endpoint.toml"));
        assert_eq!(cache.read().unwrap(), None);
    }

    #[test]
    fn file_cache_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("endpoint.toml");
        let cache = FileEndpointCache::new(&path);

        cache.write(&endpoint()).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());

        // A fresh instance sees the same value, as after a restart
        let reopened = FileEndpointCache::new(&path);
        assert_eq!(reopened.read().unwrap(), Some(endpoint()));
        assert!(reopened.load().unwrap().unwrap().verified_at > 0);
    }

    #[test]
    fn file_cache_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("endpoint.toml");
        std::fs::write(&path, "base_url = \"not a url\"\n").unwrap();

        let cache = FileEndpointCache::new(&path);
        assert_eq!(cache.read().unwrap(), None);
    }

    #[test]
    fn file_cache_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileEndpointCache::new(dir.path().join("endpoint.toml"));
        cache.write(&endpoint()).unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.read().unwrap(), None);
        // Clearing an empty cache is fine
        cache.clear().unwrap();
    }

    #[test]
    fn memory_cache_counts_writes() {
        let cache = MemoryEndpointCache::with_endpoint(endpoint());
        assert_eq!(cache.read().unwrap(), Some(endpoint()));
        assert_eq!(cache.writes(), 0);

        cache.write(&endpoint()).unwrap();
        assert_eq!(cache.writes(), 1);

        cache.clear().unwrap();
        assert_eq!(cache.read().unwrap(), None);
    }
}

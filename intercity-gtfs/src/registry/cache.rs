//! Disk cache for the registry snapshot.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::error::RegistryError;
use super::snapshot::RegistryStop;

/// Default snapshot TTL: 7 days. Stations move rarely.
const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// On-disk form of a snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSnapshot {
    /// Seconds since the Unix epoch at download time.
    fetched_at: u64,
    stops: Vec<RegistryStop>,
}

fn unix_now() -> Option<u64> {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

/// Configuration for the snapshot cache.
#[derive(Debug, Clone)]
pub struct RegistryCacheConfig {
    /// Path to the cache file.
    pub path: PathBuf,
    /// How long a snapshot counts as fresh.
    pub ttl: Duration,
}

impl RegistryCacheConfig {
    /// Create a new cache config with the given path and default TTL.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Set a custom TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Default for RegistryCacheConfig {
    fn default() -> Self {
        Self::new("stops.json")
    }
}

/// Disk cache for the registry snapshot.
#[derive(Debug, Clone)]
pub struct RegistryCache {
    config: RegistryCacheConfig,
}

impl RegistryCache {
    pub fn new(config: RegistryCacheConfig) -> Self {
        Self { config }
    }

    /// Load the snapshot if it exists and has not expired.
    pub fn load(&self) -> Option<Vec<RegistryStop>> {
        let stored = self.read()?;
        let age = unix_now()?.saturating_sub(stored.fetched_at);
        (age < self.config.ttl.as_secs()).then_some(stored.stops)
    }

    fn read(&self) -> Option<StoredSnapshot> {
        let contents = std::fs::read(&self.config.path).ok()?;
        serde_json::from_slice(&contents).ok()
    }

    /// Save the snapshot, creating parent directories as needed. The file is
    /// replaced in one step, so a crash never leaves half a snapshot.
    pub fn save(&self, stops: &[RegistryStop]) -> Result<(), RegistryError> {
        let cache_err = |what: &str, e: &dyn std::fmt::Display| RegistryError::Cache {
            message: format!("{what}: {e}"),
        };

        let fetched_at = unix_now().ok_or_else(|| RegistryError::Cache {
            message: "system clock before 1970".to_string(),
        })?;
        let json = serde_json::to_vec(&StoredSnapshot {
            fetched_at,
            stops: stops.to_vec(),
        })
        .map_err(|e| cache_err("failed to serialize snapshot", &e))?;

        let dir = match self.config.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| cache_err("failed to create cache directory", &e))?;

        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| cache_err("failed to create snapshot file", &e))?;
        tmp.write_all(&json)
            .map_err(|e| cache_err("failed to write snapshot file", &e))?;
        tmp.persist(&self.config.path)
            .map_err(|e| cache_err("failed to replace snapshot file", &e))?;

        debug!(path = %self.config.path.display(), stops = stops.len(), "saved stop registry");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

//! Registry lookups over an in-memory snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{BoundingBox, Coord, StopCode};

use super::cache::RegistryCache;
use super::client::RegistryClient;
use super::error::RegistryError;

/// A stop as known to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStop {
    /// Registry identifier, e.g. "node/123".
    pub id: String,
    /// Upper-cased display name.
    pub name: String,
    pub coord: Coord,
    /// Operator stop codes tagged on this stop.
    #[serde(default)]
    pub codes: Vec<String>,
}

/// Read-only lookups into an external stop registry.
///
/// Implementations return candidates ordered by id so that callers picking
/// the first of equals behave the same on every run.
pub trait StopRegistry {
    /// Stops tagged with the given operator code.
    fn by_code(&self, code: &StopCode) -> Result<Vec<RegistryStop>, RegistryError>;

    /// Candidate stops for `name`, inside `bbox` when given. Callers score
    /// the names themselves.
    fn search(
        &self,
        name: &str,
        bbox: Option<&BoundingBox>,
    ) -> Result<Vec<RegistryStop>, RegistryError>;
}

impl<R: StopRegistry + ?Sized> StopRegistry for &R {
    fn by_code(&self, code: &StopCode) -> Result<Vec<RegistryStop>, RegistryError> {
        (**self).by_code(code)
    }

    fn search(
        &self,
        name: &str,
        bbox: Option<&BoundingBox>,
    ) -> Result<Vec<RegistryStop>, RegistryError> {
        (**self).search(name, bbox)
    }
}

/// A registry held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    stops: Vec<RegistryStop>,
    by_code: HashMap<String, Vec<usize>>,
}

impl RegistrySnapshot {
    pub fn new(mut stops: Vec<RegistryStop>) -> Self {
        stops.sort_by(|a, b| a.id.cmp(&b.id));

        let mut by_code: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, stop) in stops.iter().enumerate() {
            for code in &stop.codes {
                by_code.entry(code.clone()).or_default().push(idx);
            }
        }

        Self { stops, by_code }
    }

    /// Use a fresh cached snapshot, or download one.
    ///
    /// A failed download makes the registry unavailable, whatever the cache
    /// holds. An expired snapshot is never used.
    pub async fn obtain(
        client: &RegistryClient,
        cache: &RegistryCache,
        force_refresh: bool,
    ) -> Result<Self, RegistryError> {
        if !force_refresh && let Some(stops) = cache.load() {
            info!(stops = stops.len(), path = %cache.path().display(), "using cached stop registry");
            return Ok(Self::new(stops));
        }

        match client.fetch_all().await {
            Ok(stops) => {
                if let Err(e) = cache.save(&stops) {
                    warn!(error = %e, "failed to cache stop registry");
                }
                Ok(Self::new(stops))
            }
            Err(e) => Err(RegistryError::Unavailable {
                message: e.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

impl StopRegistry for RegistrySnapshot {
    fn by_code(&self, code: &StopCode) -> Result<Vec<RegistryStop>, RegistryError> {
        Ok(self
            .by_code
            .get(code.as_str())
            .map(|idxs| idxs.iter().map(|&i| self.stops[i].clone()).collect())
            .unwrap_or_default())
    }

    fn search(
        &self,
        _name: &str,
        bbox: Option<&BoundingBox>,
    ) -> Result<Vec<RegistryStop>, RegistryError> {
        Ok(self
            .stops
            .iter()
            .filter(|s| bbox.is_none_or(|b| b.contains(&s.coord)))
            .cloned()
            .collect())
    }
}

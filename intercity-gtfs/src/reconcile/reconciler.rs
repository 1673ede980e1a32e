//! Operator stop code → canonical stop resolution.

use std::collections::HashMap;
use std::sync::Arc;

use moka::sync::Cache;
use tracing::{debug, trace};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::domain::{
    BoundingBox, CanonicalStop, Confidence, Coord, StopCode, TrainRun, UnmatchedStop, title_case,
};
use crate::registry::{RegistryError, RegistryStop, StopRegistry};

use super::matcher::{AliasTable, collapse_upper, dice_similarity, normalize_name, proximity_factor};

/// Scores closer than this are treated as equal.
const SCORE_EPSILON: f64 = 1e-9;

/// Search windows are keyed at roughly 10 m resolution.
const BBOX_KEY_SCALE: f64 = 10_000.0;

/// Configuration for stop reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Minimum score for a name match to be accepted.
    pub threshold: f64,
    /// How far around the neighbouring stops to look, in metres.
    pub search_radius_m: f64,
    /// Prefix of placeholder stop ids.
    pub placeholder_prefix: String,
    /// Maximum number of cached registry searches.
    pub cache_capacity: u64,
    pub aliases: AliasTable,
}

impl ReconcilerConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_search_radius_m(mut self, radius: f64) -> Self {
        self.search_radius_m = radius;
        self
    }

    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            search_radius_m: 60_000.0,
            placeholder_prefix: "pkpic:".to_string(),
            cache_capacity: 10_000,
            aliases: AliasTable::default(),
        }
    }
}

/// Errors that abort reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("registry lookup for stop {code} failed: {source}")]
    Registry {
        code: StopCode,
        #[source]
        source: RegistryError,
    },
}

/// Outcome of resolving one operator stop code.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Matched(CanonicalStop),
    /// Not found; carries a placeholder stop.
    Unmatched(CanonicalStop),
}

impl Resolution {
    pub fn stop(&self) -> &CanonicalStop {
        match self {
            Resolution::Matched(stop) | Resolution::Unmatched(stop) => stop,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Resolution::Matched(_))
    }
}

/// What is known about a stop besides its code.
#[derive(Debug, Clone, Copy)]
pub struct ResolveHint<'a> {
    /// Name as printed by the operator.
    pub name: &'a str,
    /// Positions of already resolved stops next to this one on the route.
    pub neighbours: &'a [Coord],
    /// Id of the train run asking.
    pub train_run: &'a str,
}

/// Registry searches are cached by normalized name and search window.
type SearchKey = (String, Option<[i64; 4]>);

fn search_key(name: &str, bbox: Option<&BoundingBox>) -> SearchKey {
    let scaled = |v: f64| (v * BBOX_KEY_SCALE).round() as i64;
    (
        name.to_string(),
        bbox.map(|b| {
            [
                scaled(b.min_lat),
                scaled(b.min_lon),
                scaled(b.max_lat),
                scaled(b.max_lon),
            ]
        }),
    )
}

/// Resolves operator stop codes against a registry.
///
/// Every code is resolved once per reconciler; later requests for the same
/// code get the first answer, so repeated runs over the same input agree.
pub struct StopReconciler<R> {
    registry: R,
    config: ReconcilerConfig,
    resolved: HashMap<StopCode, Resolution>,
    searches: Cache<SearchKey, Arc<Vec<RegistryStop>>>,
    unmatched: Vec<UnmatchedStop>,
    unmatched_index: HashMap<StopCode, usize>,
}

impl<R: StopRegistry> StopReconciler<R> {
    pub fn new(registry: R, config: ReconcilerConfig) -> Self {
        let searches = Cache::builder().max_capacity(config.cache_capacity).build();
        Self {
            registry,
            config,
            resolved: HashMap::new(),
            searches,
            unmatched: Vec::new(),
            unmatched_index: HashMap::new(),
        }
    }

    /// Resolve a single operator stop code.
    pub fn resolve(
        &mut self,
        code: &StopCode,
        hint: &ResolveHint<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Resolution, ReconcileError> {
        if let Some(known) = self.resolved.get(code).cloned() {
            if !known.is_matched() {
                self.note_unmatched_run(code, hint.train_run);
            }
            return Ok(known);
        }

        let resolution = match self.lookup_code(code)? {
            Some(stop) => Resolution::Matched(stop),
            None => self.lookup_name(code, hint)?,
        };

        if !resolution.is_matched() {
            self.record_unmatched(code, hint, diagnostics);
        }
        self.resolved.insert(code.clone(), resolution.clone());
        Ok(resolution)
    }

    /// Resolve every stop of a run, in order.
    ///
    /// Codes known to the registry are settled first so that name searches
    /// for the rest can be centred on their resolved neighbours.
    pub fn resolve_run(
        &mut self,
        run: &TrainRun,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Resolution>, ReconcileError> {
        let run_id = run.id();

        let mut settled: Vec<Option<Resolution>> = Vec::with_capacity(run.stops.len());
        for stop in &run.stops {
            let early = match self.resolved.get(&stop.code) {
                Some(known) => Some(known.clone()),
                None => match self.lookup_code(&stop.code)? {
                    Some(found) => {
                        let found = Resolution::Matched(found);
                        self.resolved.insert(stop.code.clone(), found.clone());
                        Some(found)
                    }
                    None => None,
                },
            };
            settled.push(early);
        }

        let mut out = Vec::with_capacity(run.stops.len());
        for (idx, stop) in run.stops.iter().enumerate() {
            let neighbours = matched_neighbours(&settled, idx);
            let hint = ResolveHint {
                name: &stop.name,
                neighbours: &neighbours,
                train_run: &run_id,
            };
            let resolution = self.resolve(&stop.code, &hint, diagnostics)?;
            settled[idx] = Some(resolution.clone());
            out.push(resolution);
        }

        Ok(out)
    }

    /// Drop `run_id` from the unmatched tally, for a run left out of the feed.
    ///
    /// A code whose every run was withdrawn is no longer reported, but keeps
    /// its placeholder for any later run.
    pub fn withdraw_run(&mut self, run_id: &str) {
        for stop in &mut self.unmatched {
            stop.train_runs.retain(|r| r != run_id);
        }
    }

    /// Codes that could not be matched, in first-seen order, with the runs
    /// calling there.
    pub fn unmatched(&self) -> impl Iterator<Item = &UnmatchedStop> {
        self.unmatched.iter().filter(|u| !u.train_runs.is_empty())
    }

    pub fn into_unmatched(self) -> Vec<UnmatchedStop> {
        self.unmatched
            .into_iter()
            .filter(|u| !u.train_runs.is_empty())
            .collect()
    }

    fn lookup_code(&self, code: &StopCode) -> Result<Option<CanonicalStop>, ReconcileError> {
        let candidates = self
            .registry
            .by_code(code)
            .map_err(|source| ReconcileError::Registry {
                code: code.clone(),
                source,
            })?;

        Ok(candidates.into_iter().next().map(|found| {
            trace!(%code, id = %found.id, "matched stop by code");
            canonical(&found, 1.0)
        }))
    }

    fn lookup_name(
        &self,
        code: &StopCode,
        hint: &ResolveHint<'_>,
    ) -> Result<Resolution, ReconcileError> {
        let name = normalize_name(hint.name, &self.config.aliases);
        let bbox = BoundingBox::around(hint.neighbours, self.config.search_radius_m);
        let centre = Coord::centroid(hint.neighbours);
        let candidates = self.search(code, &name, bbox.as_ref())?;

        let mut best: Option<(f64, f64, &RegistryStop)> = None;
        for candidate in candidates.iter() {
            let similarity = dice_similarity(&name, &collapse_upper(&candidate.name));
            let distance = centre.map_or(0.0, |c| c.haversine_distance(&candidate.coord));
            let score = match centre {
                Some(_) => similarity * proximity_factor(distance, self.config.search_radius_m),
                None => similarity,
            };

            let better = match best {
                None => true,
                Some((best_score, best_distance, _)) => {
                    score > best_score + SCORE_EPSILON
                        || ((score - best_score).abs() <= SCORE_EPSILON
                            && distance < best_distance)
                }
            };
            if better {
                best = Some((score, distance, candidate));
            }
        }

        match best {
            Some((score, _, found)) if score >= self.config.threshold => {
                debug!(%code, %name, id = %found.id, score, "matched stop by name");
                Ok(Resolution::Matched(canonical(found, score)))
            }
            _ => {
                debug!(%code, %name, "no registry match, using placeholder");
                Ok(Resolution::Unmatched(CanonicalStop {
                    id: format!("{}{}", self.config.placeholder_prefix, code),
                    name: title_case(hint.name.trim()),
                    coord: centre.unwrap_or(Coord::new(0.0, 0.0)),
                    confidence: Confidence::Placeholder,
                }))
            }
        }
    }

    fn search(
        &self,
        code: &StopCode,
        name: &str,
        bbox: Option<&BoundingBox>,
    ) -> Result<Arc<Vec<RegistryStop>>, ReconcileError> {
        let key = search_key(name, bbox);
        if let Some(hit) = self.searches.get(&key) {
            return Ok(hit);
        }

        let found = self
            .registry
            .search(name, bbox)
            .map_err(|source| ReconcileError::Registry {
                code: code.clone(),
                source,
            })?;
        let found = Arc::new(found);
        self.searches.insert(key, found.clone());
        Ok(found)
    }

    fn record_unmatched(
        &mut self,
        code: &StopCode,
        hint: &ResolveHint<'_>,
        diagnostics: &mut Diagnostics,
    ) {
        diagnostics.push(Diagnostic::UnmatchedStop {
            code: code.to_string(),
            name: hint.name.to_string(),
        });
        self.unmatched_index
            .insert(code.clone(), self.unmatched.len());
        self.unmatched.push(UnmatchedStop {
            code: code.clone(),
            raw_name: hint.name.to_string(),
            location_hint: Coord::centroid(hint.neighbours),
            train_runs: vec![hint.train_run.to_string()],
        });
    }

    fn note_unmatched_run(&mut self, code: &StopCode, train_run: &str) {
        if let Some(&idx) = self.unmatched_index.get(code) {
            let runs = &mut self.unmatched[idx].train_runs;
            if !runs.iter().any(|r| r == train_run) {
                runs.push(train_run.to_string());
            }
        }
    }
}

fn canonical(found: &RegistryStop, score: f64) -> CanonicalStop {
    CanonicalStop {
        id: found.id.clone(),
        name: title_case(&found.name),
        coord: found.coord,
        confidence: Confidence::Matched { score },
    }
}

/// Positions of the nearest matched stops before and after `idx`.
fn matched_neighbours(settled: &[Option<Resolution>], idx: usize) -> Vec<Coord> {
    let matched_coord = |r: &Option<Resolution>| match r {
        Some(Resolution::Matched(stop)) => Some(stop.coord),
        _ => None,
    };

    let before = settled[..idx].iter().rev().find_map(matched_coord);
    let after = settled[idx + 1..].iter().find_map(matched_coord);
    before.into_iter().chain(after).collect()
}

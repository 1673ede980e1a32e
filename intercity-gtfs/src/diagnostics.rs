//! Non-fatal conditions collected during a run.
//!
//! Nothing in here stops the pipeline. Each entry is logged as it is
//! recorded and the full list is returned with the run summary.

use std::fmt;

use tracing::{debug, warn};

/// A condition worth reporting that did not abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A record (row or whole train) was left out of the feed.
    RecordSkipped { record: String, reason: String },

    /// An operator stop code could not be reconciled; a placeholder was used.
    UnmatchedStop { code: String, name: String },

    /// Stops outside the coverage region were dropped from a trip.
    CoverageTruncation { trip_id: String, dropped: usize },

    /// The operator flags this train as joined to or split from others;
    /// it was processed on its own.
    CouplingIgnored {
        trip_id: String,
        coupled_with: Vec<String>,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::RecordSkipped { record, reason } => {
                write!(f, "skipped {record}: {reason}")
            }
            Diagnostic::UnmatchedStop { code, name } => {
                write!(f, "stop {code} ({name}) not found in registry")
            }
            Diagnostic::CoverageTruncation { trip_id, dropped } => {
                write!(f, "trip {trip_id}: dropped {dropped} stops outside coverage")
            }
            Diagnostic::CouplingIgnored {
                trip_id,
                coupled_with,
            } => write!(
                f,
                "trip {trip_id}: coupling with {} not reconciled",
                coupled_with.join(", ")
            ),
        }
    }
}

/// Ordered collection of diagnostics for one run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::RecordSkipped { .. } | Diagnostic::UnmatchedStop { .. } => {
                warn!("{}", diagnostic)
            }
            Diagnostic::CoverageTruncation { .. } | Diagnostic::CouplingIgnored { .. } => {
                debug!("{}", diagnostic)
            }
        }
        self.entries.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of skipped records.
    pub fn skipped(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| matches!(d, Diagnostic::RecordSkipped { .. }))
            .count()
    }

    /// Number of truncated trips.
    pub fn truncated(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| matches!(d, Diagnostic::CoverageTruncation { .. }))
            .count()
    }
}

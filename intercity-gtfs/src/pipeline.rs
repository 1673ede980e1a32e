//! One conversion, end to end.
//!
//! Export → train runs → reconciled stops → GTFS times → trips → archive.
//! Fatal errors stop the run before anything is written; everything else
//! ends up in [`Diagnostics`].

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::assemble::{AssembleError, AssembledFeed, TripAssembler};
use crate::config::PipelineConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::domain::UnmatchedStop;
use crate::feed::{FeedError, FeedStats, FeedWriter, stage_missing_report};
use crate::reconcile::{ReconcileError, StopReconciler};
use crate::registry::{
    RegistryCache, RegistryClient, RegistryError, RegistrySnapshot, StopRegistry,
};
use crate::schedule::{ParseError, ScheduleParser};

/// Name of the schedule table inside the operator's zip.
pub const EXPORT_ENTRY: &str = "KPD_Rozklad.csv";

/// Errors that abort a conversion.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to read {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open export archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("export archive has no schedule table")]
    MissingEntry,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// In-memory result of a conversion, before anything is written.
#[derive(Debug)]
pub struct BuiltFeed {
    pub feed: AssembledFeed,
    pub unmatched: Vec<UnmatchedStop>,
    pub diagnostics: Diagnostics,
    /// Train runs read from the export.
    pub runs: usize,
}

/// What a finished conversion produced.
#[derive(Debug)]
pub struct RunSummary {
    pub runs: usize,
    pub stats: FeedStats,
    pub unmatched: usize,
    pub report_written: bool,
    pub diagnostics: Diagnostics,
}

/// The conversion, configured.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read the export, obtain the registry, build and write the feed.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let export = load_export(&self.config.input)?;

        let client = RegistryClient::new(self.config.registry_client.clone())?;
        let cache = RegistryCache::new(self.config.registry_cache.clone());
        let registry =
            RegistrySnapshot::obtain(&client, &cache, self.config.refresh_registry).await?;
        info!(stops = registry.len(), "stop registry ready");

        let built = self.build(&export, &registry)?;
        self.write(built)
    }

    /// Convert an export against `registry`, in memory.
    pub fn build<R: StopRegistry>(
        &self,
        export: &[u8],
        registry: R,
    ) -> Result<BuiltFeed, PipelineError> {
        let mut diagnostics = Diagnostics::new();

        let parser = ScheduleParser::new(self.config.parser.clone());
        let runs = parser.parse(export, &mut diagnostics)?;

        let mut reconciler = StopReconciler::new(registry, self.config.reconciler.clone());
        let resolver = self.config.resolver;
        let mut assembler = TripAssembler::new(self.config.coverage);

        for run in &runs {
            let regimes = match resolver.partition_by_regime(run) {
                Ok(regimes) => regimes,
                Err(e) => {
                    diagnostics.push(Diagnostic::RecordSkipped {
                        record: run.id(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let resolutions = reconciler.resolve_run(run, &mut diagnostics)?;
            let mut emitted = false;
            for regime in &regimes {
                emitted |= assembler
                    .assemble(run, &resolutions, regime, &mut diagnostics)?
                    .is_some();
            }
            if !emitted {
                reconciler.withdraw_run(&run.id());
            }
        }

        let feed = assembler.finish();
        let unmatched = reconciler.into_unmatched();
        info!(
            runs = runs.len(),
            trips = feed.trips.len(),
            calendars = feed.calendars.len(),
            stops = feed.stops.len(),
            unmatched = unmatched.len(),
            diagnostics = diagnostics.len(),
            "assembled feed"
        );

        Ok(BuiltFeed {
            feed,
            unmatched,
            diagnostics,
            runs: runs.len(),
        })
    }

    /// Write the archive and the unmatched stops report.
    ///
    /// Both are prepared before either is put in place. The report goes
    /// first, so a failure anywhere leaves no new archive behind.
    pub fn write(&self, built: BuiltFeed) -> Result<RunSummary, PipelineError> {
        let feed_config = self
            .config
            .feed
            .clone()
            .with_timezone(self.config.resolver.tz());
        let writer = FeedWriter::new(feed_config);

        let (archive, stats) = writer.stage(&built.feed, &self.config.output)?;
        let report = stage_missing_report(&built.unmatched, &self.config.missing_report)?;
        let report_written = report.commit()?;
        archive.commit()?;
        info!(
            path = %self.config.output.display(),
            trips = stats.trips,
            stops = stats.stops,
            "wrote GTFS feed"
        );

        if !built.unmatched.is_empty() {
            warn!(
                count = built.unmatched.len(),
                report = %self.config.missing_report.display(),
                "some stops could not be matched"
            );
        }

        Ok(RunSummary {
            runs: built.runs,
            stats,
            unmatched: built.unmatched.len(),
            report_written,
            diagnostics: built.diagnostics,
        })
    }
}

/// Read the schedule export at `path`.
///
/// Accepts the zip the operator delivers, taking [`EXPORT_ENTRY`] or else
/// any CSV inside, or the bare CSV.
pub fn load_export(path: &Path) -> Result<Vec<u8>, PipelineError> {
    let bytes = std::fs::read(path).map_err(|source| PipelineError::Input {
        path: path.to_path_buf(),
        source,
    })?;
    if !bytes.starts_with(b"PK\x03\x04") {
        return Ok(bytes);
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let name = archive
        .file_names()
        .find(|n| *n == EXPORT_ENTRY)
        .or_else(|| {
            archive
                .file_names()
                .find(|n| n.to_ascii_lowercase().ends_with(".csv"))
        })
        .map(str::to_string)
        .ok_or(PipelineError::MissingEntry)?;

    let mut entry = archive.by_name(&name)?;
    let mut out = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut out)
        .map_err(|source| PipelineError::Input {
            path: path.join(&name),
            source,
        })?;
    Ok(out)
}

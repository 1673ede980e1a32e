//! The unmatched stops report.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::UnmatchedStop;

use super::error::FeedError;
use super::records::MissingStopRecord;
use super::staged::StagedFile;
use super::writer::to_csv;

/// The report for one conversion, not yet in place.
#[derive(Debug)]
pub enum StagedReport {
    Write { file: StagedFile, stops: usize },
    /// Every stop was matched; any earlier report goes.
    Remove(PathBuf),
}

impl StagedReport {
    /// Put the report in place. Returns whether a report was written.
    pub fn commit(self) -> Result<bool, FeedError> {
        match self {
            StagedReport::Write { file, stops } => {
                let path = file.path().to_path_buf();
                file.commit()?;
                info!(path = %path.display(), stops, "wrote missing stops report");
                Ok(true)
            }
            StagedReport::Remove(path) => {
                match std::fs::remove_file(&path) {
                    Ok(()) => debug!(path = %path.display(), "removed stale missing stops report"),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                Ok(false)
            }
        }
    }
}

/// Prepare `unmatched` as CSV for `path`.
///
/// When every stop was matched nothing is written and a report left over
/// from an earlier run is removed instead, so an existing file always
/// describes the latest feed. `train_runs` lists the runs that made it into
/// the feed.
pub fn stage_missing_report(
    unmatched: &[UnmatchedStop],
    path: &Path,
) -> Result<StagedReport, FeedError> {
    if unmatched.is_empty() {
        return Ok(StagedReport::Remove(path.to_path_buf()));
    }

    let bytes = to_csv(unmatched.iter().map(MissingStopRecord::from))?;
    Ok(StagedReport::Write {
        file: StagedFile::new(path, &bytes)?,
        stops: unmatched.len(),
    })
}

/// Write `unmatched` as CSV to `path` straight away. Returns whether a
/// report was written.
pub fn write_missing_report(unmatched: &[UnmatchedStop], path: &Path) -> Result<bool, FeedError> {
    stage_missing_report(unmatched, path)?.commit()
}

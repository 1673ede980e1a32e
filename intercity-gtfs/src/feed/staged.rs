//! Outputs written beside their destination and moved into place later.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::error::FeedError;

/// A file fully written to a temporary path in its destination directory.
///
/// Dropping it without [`commit`](Self::commit) deletes the temporary file
/// and leaves the destination untouched.
#[derive(Debug)]
pub struct StagedFile {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    pub fn new(path: &Path, bytes: &[u8]) -> Result<Self, FeedError> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        Ok(Self {
            tmp,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename into place, replacing any file already there.
    pub fn commit(self) -> Result<(), FeedError> {
        self.tmp.persist(&self.path)?;
        debug!(path = %self.path.display(), "committed output");
        Ok(())
    }
}

//! Feed writing error types.

/// Errors that can occur while writing the feed or the report.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The finished file could not be moved into place.
    #[error("failed to replace output file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

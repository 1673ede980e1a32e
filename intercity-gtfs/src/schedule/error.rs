//! Schedule parser error types.

/// Errors that make the whole export unreadable.
///
/// Problems confined to a single train are not errors; they are reported as
/// skipped records and the train is left out.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Input contains no bytes at all
    #[error("schedule export is empty")]
    Empty,

    /// Input is not valid in the configured encoding
    #[error("schedule export is not valid {encoding}")]
    Encoding { encoding: &'static str },

    /// Header row could not be read
    #[error("unreadable header row: {0}")]
    Header(#[source] csv::Error),

    /// A column the parser cannot do without is absent
    #[error("required column {0:?} missing from header")]
    MissingColumn(&'static str),

    /// Header present but no data rows follow
    #[error("schedule export contains no data rows")]
    NoRecords,
}

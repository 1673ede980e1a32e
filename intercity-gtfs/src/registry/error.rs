//! Stop registry error types.

/// Errors that can occur when obtaining or querying the stop registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Overpass returned an error status
    #[error("registry API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// Snapshot cache operation failed
    #[error("cache error: {message}")]
    Cache { message: String },

    /// No snapshot could be obtained, or the registry stopped answering.
    #[error("stop registry unavailable: {message}")]
    Unavailable { message: String },
}

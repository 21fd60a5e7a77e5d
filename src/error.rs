/// Error types for the ipenrich library
use std::fmt;

/// Result type alias for enrichment operations
pub type Result<T> = std::result::Result<T, EnrichError>;

/// Main error type for enrichment operations
///
/// Only failures that make a component unusable are reported here.
/// Out-of-bounds reads are counted (see `GeoDatabase::index_errors`),
/// unknown addresses are `None`, and malformed list lines are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichError {
    /// File absent, zero-length, or the mapping could not be set up
    Open(String),

    /// Header failed the plausibility check (embedded date)
    CorruptHeader(String),

    /// A previous open rejected the database; it will not be retried
    Rejected(String),

    /// I/O errors
    Io(String),

    /// Configuration errors
    Config(String),
}

impl fmt::Display for EnrichError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichError::Open(msg) => write!(f, "Open failed: {}", msg),
            EnrichError::CorruptHeader(msg) => write!(f, "Corrupt header: {}", msg),
            EnrichError::Rejected(msg) => write!(f, "Database rejected: {}", msg),
            EnrichError::Io(msg) => write!(f, "I/O error: {}", msg),
            EnrichError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for EnrichError {}

impl From<std::io::Error> for EnrichError {
    fn from(err: std::io::Error) -> Self {
        EnrichError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EnrichError {
    fn from(err: serde_json::Error) -> Self {
        EnrichError::Config(err.to_string())
    }
}

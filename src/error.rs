//! Error types for the cutting-plane solver.

use thiserror::Error;

/// Errors that can occur while loading instances or driving the
/// cutting-plane loop.
#[derive(Error, Debug)]
pub enum CutplaneError {
    /// Instance file failed to parse. Fatal before model construction.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Underlying I/O failure while reading an instance or writing output.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The solver backend is not available in this build.
    #[error("solver backend unavailable: {0}")]
    SolverUnavailable(String),

    /// The solver backend reported an internal failure.
    #[error("solver backend error: {0}")]
    Backend(String),

    /// Serialization failure while exporting results.
    #[error("export error: {0}")]
    Export(String),
}

/// Result type for cutplane operations.
pub type Result<T> = std::result::Result<T, CutplaneError>;

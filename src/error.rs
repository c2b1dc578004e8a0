use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the query core.
///
/// Cancellation is deliberately not represented here: a cancelled scan
/// stops returning results without setting an error.
#[derive(Debug, Error)]
pub enum Error {
    /// A builder step or shape tree that cannot be executed.
    #[error("malformed query: {0}")]
    Malformed(&'static str),
    /// Invalid regular-expression or wildcard pattern.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    /// I/O error reported by a storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Logical error reported by a storage backend.
    #[error("backend failure: {0}")]
    Backend(String),
    /// A reference the backend no longer recognizes.
    #[error("{0} not found")]
    NotFound(&'static str),
}

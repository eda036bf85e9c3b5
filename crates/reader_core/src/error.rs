//! crates/reader_core/src/error.rs
//!
//! The error type shared by the reader's core operations.

use crate::domain::BookId;
use crate::ports::PortError;

/// Errors surfaced by foreground operations of the core.
///
/// A sync conflict is not an error: it is reported as part of the sync outcome.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// The requested book is not in the library.
    #[error("Book not found: {0}")]
    NotFound(BookId),

    /// Input was rejected before anything was applied.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A local or remote store failed.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] PortError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A convenience type alias for `Result<T, ReaderError>`.
pub type ReaderResult<T> = Result<T, ReaderError>;

//! crates/reader_core/src/ports.rs
//!
//! Defines the service contracts (traits) the reader core depends on.
//! These traits form the boundary of the hexagonal architecture: the core never
//! talks to a database, a cloud document store or a file parser directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ExtractedBook;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Datasets
//=========================================================================================

/// The logical datasets the reader persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Books,
    ReadingHistory,
    AppSettings,
    ThemeSettings,
}

impl Dataset {
    /// Key of the dataset in the local store.
    pub fn key(self) -> &'static str {
        match self {
            Dataset::Books => "books",
            Dataset::ReadingHistory => "readingHistory",
            Dataset::AppSettings => "appSettings",
            Dataset::ThemeSettings => "themeSettings",
        }
    }

    /// Key of the companion last-modified marker in the local store.
    pub fn marker_key(self) -> String {
        format!("{}LastModified", self.key())
    }

    /// Name of the dataset in the remote document store.
    pub fn remote_name(self) -> &'static str {
        match self {
            Dataset::Books => "BOOKS",
            Dataset::ReadingHistory => "READING_HISTORY",
            Dataset::AppSettings => "APP_SETTINGS",
            Dataset::ThemeSettings => "THEME_SETTINGS",
        }
    }
}

/// A dataset as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub data: serde_json::Value,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A key-value store of JSON blobs, local to the reader.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;
}

/// A document store keyed by dataset name, scoped to the signed-in identity.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Loads a dataset, or `None` if it was never saved.
    async fn load(&self, dataset: Dataset) -> PortResult<Option<RemoteDocument>>;

    /// Saves a dataset. `Ok(false)` means the store refused the write.
    async fn save(&self, dataset: Dataset, document: &RemoteDocument) -> PortResult<bool>;
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Turns a raw file into a normalised book.
    ///
    /// Implementations should degrade to [`ExtractedBook::stand_in`] rather than
    /// fail when the content cannot be read.
    async fn extract(&self, file_name: &str, bytes: &[u8]) -> PortResult<ExtractedBook>;
}

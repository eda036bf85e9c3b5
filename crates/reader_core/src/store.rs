//! crates/reader_core/src/store.rs
//!
//! Typed access to the local key-value store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::domain::{AppSettings, Book, ReadingSession, ThemeSettings};
use crate::error::ReaderResult;
use crate::library::Library;
use crate::ports::{Dataset, LocalStore};

/// Everything the reader persists locally, as loaded at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibrarySnapshot {
    pub books: Vec<Book>,
    pub history: Vec<ReadingSession>,
    pub app_settings: AppSettings,
    pub theme_settings: ThemeSettings,
}

impl From<LibrarySnapshot> for Library {
    fn from(snapshot: LibrarySnapshot) -> Self {
        Library::new(
            snapshot.books,
            snapshot.history,
            snapshot.app_settings.normalized(),
            snapshot.theme_settings,
        )
    }
}

#[derive(Clone)]
pub struct LibraryStore {
    local: Arc<dyn LocalStore>,
}

impl LibraryStore {
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self { local }
    }

    async fn load<T: DeserializeOwned + Default>(&self, dataset: Dataset) -> ReaderResult<T> {
        match self.local.get(dataset.key()).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(T::default()),
        }
    }

    /// Loads every dataset. Missing datasets come back as their defaults.
    pub async fn load_snapshot(&self) -> ReaderResult<LibrarySnapshot> {
        let (books, history, app_settings, theme_settings) = futures::try_join!(
            self.load(Dataset::Books),
            self.load(Dataset::ReadingHistory),
            self.load(Dataset::AppSettings),
            self.load(Dataset::ThemeSettings),
        )?;
        Ok(LibrarySnapshot {
            books,
            history,
            app_settings,
            theme_settings,
        })
    }

    /// Writes a dataset and, when given, its last-modified marker.
    pub async fn save<T: Serialize + ?Sized>(
        &self,
        dataset: Dataset,
        value: &T,
        marker: Option<DateTime<Utc>>,
    ) -> ReaderResult<()> {
        let raw = serde_json::to_string(value)?;
        self.local.set(dataset.key(), &raw).await?;
        if let Some(marker) = marker {
            self.set_marker(dataset, marker).await?;
        }
        Ok(())
    }

    /// The last-modified marker of a dataset. Unreadable markers count as absent.
    pub async fn marker(&self, dataset: Dataset) -> ReaderResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.local.get(&dataset.marker_key()).await? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(stamp) => Ok(Some(stamp.with_timezone(&Utc))),
            Err(e) => {
                warn!(key = %dataset.marker_key(), "Ignoring unreadable marker: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn set_marker(&self, dataset: Dataset, marker: DateTime<Utc>) -> ReaderResult<()> {
        self.local
            .set(&dataset.marker_key(), &marker.to_rfc3339())
            .await?;
        Ok(())
    }
}

//! crates/reader_core/src/backup.rs
//!
//! Export and import of the whole library as a single JSON document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{AppSettings, Book, ReadingSession, ThemeSettings};
use crate::error::{ReaderError, ReaderResult};
use crate::library::Library;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle<'a> {
    pub books: &'a [Book],
    pub reading_history: &'a [ReadingSession],
    pub app_settings: &'a AppSettings,
    pub theme_settings: &'a ThemeSettings,
    pub export_date: DateTime<Utc>,
}

/// A validated import file. Settings that were absent keep their current values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBundle {
    pub books: Vec<Book>,
    pub reading_history: Vec<ReadingSession>,
    #[serde(default)]
    pub app_settings: Option<AppSettings>,
    #[serde(default)]
    pub theme_settings: Option<ThemeSettings>,
    #[serde(default)]
    pub export_date: Option<DateTime<Utc>>,
}

pub fn export_json(library: &Library, now: DateTime<Utc>) -> ReaderResult<String> {
    let bundle = ExportBundle {
        books: library.books(),
        reading_history: library.history(),
        app_settings: &library.app_settings,
        theme_settings: &library.theme_settings,
        export_date: now,
    };
    Ok(serde_json::to_string_pretty(&bundle)?)
}

/// Parses and validates an import file without touching any state.
pub fn parse_import(raw: &str) -> ReaderResult<ImportBundle> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ReaderError::Validation(format!("not a JSON document: {e}")))?;
    let Some(object) = value.as_object() else {
        return Err(ReaderError::Validation("expected a JSON object".to_string()));
    };
    for key in ["books", "readingHistory"] {
        if !object.get(key).is_some_and(serde_json::Value::is_array) {
            return Err(ReaderError::Validation(format!("missing or invalid `{key}`")));
        }
    }
    serde_json::from_value(value)
        .map_err(|e| ReaderError::Validation(format!("invalid library data: {e}")))
}

impl Library {
    pub fn apply_import(&mut self, bundle: ImportBundle) {
        info!(
            books = bundle.books.len(),
            sessions = bundle.reading_history.len(),
            "Applying imported library"
        );
        self.replace_books(bundle.books);
        self.replace_history(bundle.reading_history);
        if let Some(settings) = bundle.app_settings {
            self.app_settings = settings.normalized();
        }
        if let Some(settings) = bundle.theme_settings {
            self.theme_settings = settings;
        }
    }
}

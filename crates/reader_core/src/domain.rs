//! crates/reader_core/src/domain.rs
//!
//! Defines the core data structures for the reader: books, chapters, reading
//! sessions and the two settings records.
//!
//! Every record keeps the camelCase JSON shape the browser client persists, and
//! reads the older field names that early data still carries.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{ReaderError, ReaderResult};
use crate::marks::{AnnotationStore, BookmarkStore};

//=========================================================================================
// Identifiers
//=========================================================================================

/// Opaque book identifier.
///
/// Early records used numeric ids, so deserialisation accepts a JSON number as
/// well as a string. New ids are UUID v4 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BookId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for BookId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => BookId(text),
            RawId::Number(number) => BookId(number.to_string()),
        })
    }
}

//=========================================================================================
// Books and Chapters
//=========================================================================================

fn first_page() -> u32 {
    1
}

/// A chapter of a book. Its position in the book's chapter list is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawChapter")]
pub struct Chapter {
    pub title: String,
    /// The page at which the chapter begins.
    pub start_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Chapter {
    pub fn new(title: impl Into<String>, start_page: u32) -> Self {
        Self {
            title: title.into(),
            start_page,
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Chapter as found on disk: the anchor lives under `startPage` or, in older
/// records, `pageNumber`. A missing or zero anchor reads as page 1.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChapter {
    #[serde(default)]
    title: String,
    #[serde(default)]
    start_page: Option<u32>,
    #[serde(default)]
    page_number: Option<u32>,
    #[serde(default)]
    content: Option<String>,
}

impl From<RawChapter> for Chapter {
    fn from(raw: RawChapter) -> Self {
        let start_page = raw
            .start_page
            .filter(|page| *page > 0)
            .or(raw.page_number.filter(|page| *page > 0))
            .unwrap_or(1);
        Self {
            title: raw.title,
            start_page,
            content: raw.content,
        }
    }
}

/// A book in the library, together with its reading position and marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// URL, data-URI or storage key of the cover image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    pub total_pages: u32,
    #[serde(default = "first_page")]
    pub current_page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read_chapter: Option<usize>,
    #[serde(default)]
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub bookmarks: BookmarkStore,
    #[serde(default)]
    pub annotations: AnnotationStore,
    /// Saved scroll offset per chapter index.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scroll_positions: BTreeMap<usize, f64>,
}

/// Fields of a manually entered book.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub cover: Option<String>,
    pub total_pages: u32,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

/// The normalised book the content extraction collaborator produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedBook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub cover: Option<String>,
    pub total_pages: u32,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl ExtractedBook {
    /// The one-chapter book handed back when a file cannot be extracted.
    pub fn stand_in(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            cover: None,
            total_pages: 1,
            chapters: vec![Chapter::new("Chapter 1", 1)
                .with_content("The content of this file could not be extracted.")],
        }
    }
}

impl Book {
    /// Builds a book from a manual entry form.
    pub fn manual(entry: NewBook, now: DateTime<Utc>) -> ReaderResult<Self> {
        let title = entry.title.trim();
        if title.is_empty() {
            return Err(ReaderError::Validation("a title is required".to_string()));
        }
        if entry.total_pages == 0 {
            return Err(ReaderError::Validation(
                "the total page count must be positive".to_string(),
            ));
        }

        let mut chapters = entry.chapters;
        if chapters.is_empty() {
            chapters.push(Chapter::new("Chapter 1", 1));
        }
        for chapter in &mut chapters {
            chapter.start_page = chapter.start_page.clamp(1, entry.total_pages);
        }

        Ok(Self {
            id: BookId::generate(),
            title: title.to_string(),
            author: entry.author.trim().to_string(),
            cover: entry.cover,
            total_pages: entry.total_pages,
            current_page: 1,
            last_read_chapter: None,
            last_modified: now,
            chapters,
            bookmarks: BookmarkStore::default(),
            annotations: AnnotationStore::default(),
            scroll_positions: BTreeMap::new(),
        })
    }

    /// Builds a book from the output of the content extraction collaborator.
    ///
    /// Degenerate books are accepted as they are; only a zero page count is
    /// raised to one so the position invariants hold.
    pub fn from_extracted(extracted: ExtractedBook, now: DateTime<Utc>) -> Self {
        Self {
            id: BookId::generate(),
            title: extracted.title,
            author: extracted.author,
            cover: extracted.cover,
            total_pages: extracted.total_pages.max(1),
            current_page: 1,
            last_read_chapter: None,
            last_modified: now,
            chapters: extracted.chapters,
            bookmarks: BookmarkStore::default(),
            annotations: AnnotationStore::default(),
            scroll_positions: BTreeMap::new(),
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_modified = now;
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        f64::from(self.current_page) / f64::from(self.total_pages) * 100.0
    }

    pub fn is_finished(&self) -> bool {
        self.current_page >= self.total_pages
    }
}

//=========================================================================================
// Reading Sessions
//=========================================================================================

/// An immutable record of a stretch of reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSession {
    pub id: u64,
    pub book_id: BookId,
    #[serde(alias = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "duration")]
    pub duration_minutes: u32,
    pub pages_read: u32,
    /// Index of the chapter the reader was in when the session was flushed.
    #[serde(default)]
    pub chapter_id: i64,
}

//=========================================================================================
// Settings
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageTurnAnimation {
    Slide,
    Fade,
    Flip,
    None,
}

/// App-wide reading preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub page_turn_animation: PageTurnAnimation,
    pub font_family: String,
    pub font_size: u32,
    pub line_spacing: f64,
    pub page_padding: u32,
    pub auto_sync: bool,
}

impl AppSettings {
    pub const MIN_FONT_SIZE: u32 = 12;
    pub const MAX_FONT_SIZE: u32 = 24;

    /// Returns the settings with the font size forced into the supported range.
    pub fn normalized(mut self) -> Self {
        self.font_size = self.font_size.clamp(Self::MIN_FONT_SIZE, Self::MAX_FONT_SIZE);
        self
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            page_turn_animation: PageTurnAnimation::Slide,
            font_family: "system-ui".to_string(),
            font_size: 16,
            line_spacing: 1.5,
            page_padding: 20,
            auto_sync: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Sepia,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeSettings {
    pub default_theme: Theme,
    pub auto_night_mode: bool,
    /// `HH:MM`, local time.
    pub night_mode_start_time: String,
    pub night_mode_end_time: String,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            default_theme: Theme::Light,
            auto_night_mode: false,
            night_mode_start_time: "20:00".to_string(),
            night_mode_end_time: "07:00".to_string(),
        }
    }
}

impl ThemeSettings {
    /// The theme to show at `time`. The night window may wrap midnight.
    pub fn theme_at(&self, time: NaiveTime) -> Theme {
        if !self.auto_night_mode {
            return self.default_theme;
        }
        let (Ok(start), Ok(end)) = (
            NaiveTime::parse_from_str(&self.night_mode_start_time, "%H:%M"),
            NaiveTime::parse_from_str(&self.night_mode_end_time, "%H:%M"),
        ) else {
            return self.default_theme;
        };

        let is_night = if start <= end {
            time >= start && time < end
        } else {
            time >= start || time < end
        };
        if is_night {
            Theme::Dark
        } else {
            self.default_theme
        }
    }
}

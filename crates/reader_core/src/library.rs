//! crates/reader_core/src/library.rs
//!
//! The in-memory owner of the book collection, the reading history and the
//! settings. All mutations go through here; persisting the result is the
//! caller's job (see [`crate::store::LibraryStore`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AppSettings, Book, BookId, ReadingSession, ThemeSettings};
use crate::error::{ReaderError, ReaderResult};
use crate::marks::{Bookmark, BookmarkKey};
use crate::position::ProgressChanged;
use crate::session::SessionDraft;

//=========================================================================================
// Library view queries
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusFilter {
    #[default]
    All,
    Reading,
    Completed,
    NotStarted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Title,
    Author,
    Recent,
    Progress,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LibraryQuery {
    pub search: Option<String>,
    pub status: StatusFilter,
    pub sort: SortOrder,
}

impl StatusFilter {
    fn matches(self, book: &Book) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Reading => book.current_page > 1 && !book.is_finished(),
            StatusFilter::Completed => book.is_finished(),
            StatusFilter::NotStarted => book.current_page <= 1 && !book.is_finished(),
        }
    }
}

//=========================================================================================
// Library
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Library {
    books: Vec<Book>,
    history: Vec<ReadingSession>,
    pub app_settings: AppSettings,
    pub theme_settings: ThemeSettings,
}

impl Library {
    pub fn new(
        books: Vec<Book>,
        history: Vec<ReadingSession>,
        app_settings: AppSettings,
        theme_settings: ThemeSettings,
    ) -> Self {
        Self {
            books,
            history,
            app_settings,
            theme_settings,
        }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn history(&self) -> &[ReadingSession] {
        &self.history
    }

    pub fn book(&self, id: &BookId) -> ReaderResult<&Book> {
        self.books
            .iter()
            .find(|book| &book.id == id)
            .ok_or_else(|| ReaderError::NotFound(id.clone()))
    }

    pub fn book_mut(&mut self, id: &BookId) -> ReaderResult<&mut Book> {
        self.books
            .iter_mut()
            .find(|book| &book.id == id)
            .ok_or_else(|| ReaderError::NotFound(id.clone()))
    }

    pub fn add_book(&mut self, book: Book) -> &Book {
        self.books.push(book);
        &self.books[self.books.len() - 1]
    }

    pub fn remove_book(&mut self, id: &BookId) -> ReaderResult<Book> {
        let position = self
            .books
            .iter()
            .position(|book| &book.id == id)
            .ok_or_else(|| ReaderError::NotFound(id.clone()))?;
        Ok(self.books.remove(position))
    }

    /// Replaces the stored copy of a book with the same id, or adds it.
    pub fn replace_book(&mut self, book: Book) {
        match self.books.iter_mut().find(|existing| existing.id == book.id) {
            Some(existing) => *existing = book,
            None => self.books.push(book),
        }
    }

    pub fn replace_books(&mut self, books: Vec<Book>) {
        self.books = books;
    }

    pub fn replace_history(&mut self, history: Vec<ReadingSession>) {
        self.history = history;
    }

    /// Writes a navigation event back into the book.
    pub fn apply_progress(
        &mut self,
        progress: &ProgressChanged,
        scroll_offsets: impl IntoIterator<Item = (usize, f64)>,
        now: DateTime<Utc>,
    ) -> ReaderResult<()> {
        let book = self.book_mut(&progress.book_id)?;
        book.current_page = progress.page.clamp(1, book.total_pages.max(1));
        book.last_read_chapter = Some(progress.chapter);
        book.scroll_positions.extend(scroll_offsets);
        book.touch(now);
        Ok(())
    }

    pub fn add_bookmark(
        &mut self,
        id: &BookId,
        bookmark: Bookmark,
        now: DateTime<Utc>,
    ) -> ReaderResult<BookmarkKey> {
        let book = self.book_mut(id)?;
        let key = book.bookmarks.add(bookmark);
        book.touch(now);
        Ok(key)
    }

    pub fn remove_bookmark(
        &mut self,
        id: &BookId,
        key: BookmarkKey,
        now: DateTime<Utc>,
    ) -> ReaderResult<bool> {
        let book = self.book_mut(id)?;
        let removed = book.bookmarks.remove(key);
        if removed {
            book.touch(now);
        }
        Ok(removed)
    }

    /// Adds or removes the rich bookmark at a chapter position. Returns true if added.
    pub fn toggle_bookmark(
        &mut self,
        id: &BookId,
        chapter: usize,
        offset: f64,
        snippet: &str,
        now: DateTime<Utc>,
    ) -> ReaderResult<bool> {
        let book = self.book_mut(id)?;
        let added = book.bookmarks.toggle_at(chapter, offset, snippet, now);
        book.touch(now);
        Ok(added)
    }

    pub fn add_annotation(
        &mut self,
        id: &BookId,
        page: u32,
        highlighted_text: &str,
        note_text: &str,
        now: DateTime<Utc>,
    ) -> ReaderResult<Uuid> {
        let book = self.book_mut(id)?;
        if page < 1 || page > book.total_pages {
            return Err(ReaderError::Validation(format!(
                "page {page} is outside 1..={}",
                book.total_pages
            )));
        }
        let annotation_id = book
            .annotations
            .add(page, highlighted_text, note_text, now);
        book.touch(now);
        Ok(annotation_id)
    }

    pub fn remove_annotation(
        &mut self,
        id: &BookId,
        annotation_id: Uuid,
        now: DateTime<Utc>,
    ) -> ReaderResult<bool> {
        let book = self.book_mut(id)?;
        let removed = book.annotations.remove(annotation_id);
        if removed {
            book.touch(now);
        }
        Ok(removed)
    }

    fn next_session_id(&self) -> u64 {
        self.history.iter().map(|session| session.id).max().unwrap_or(0) + 1
    }

    /// Appends a flushed session to the history.
    pub fn record_session(&mut self, draft: SessionDraft) -> &ReadingSession {
        let session = ReadingSession {
            id: self.next_session_id(),
            book_id: draft.book_id,
            timestamp: draft.timestamp,
            duration_minutes: draft.duration_minutes,
            pages_read: draft.pages_read,
            chapter_id: draft.chapter_id,
        };
        self.history.push(session);
        &self.history[self.history.len() - 1]
    }

    pub fn history_for(&self, id: &BookId) -> Vec<&ReadingSession> {
        self.history
            .iter()
            .filter(|session| &session.book_id == id)
            .collect()
    }

    /// The library view: search on title or author, filter by status, then sort.
    pub fn query(&self, query: &LibraryQuery) -> Vec<&Book> {
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase);

        let mut books: Vec<&Book> = self
            .books
            .iter()
            .filter(|book| match &needle {
                Some(needle) => {
                    book.title.to_lowercase().contains(needle)
                        || book.author.to_lowercase().contains(needle)
                }
                None => true,
            })
            .filter(|book| query.status.matches(book))
            .collect();

        match query.sort {
            SortOrder::Title => books.sort_by_key(|book| book.title.to_lowercase()),
            SortOrder::Author => books.sort_by_key(|book| book.author.to_lowercase()),
            SortOrder::Recent => books.sort_by(|a, b| b.last_modified.cmp(&a.last_modified)),
            SortOrder::Progress => books.sort_by(|a, b| {
                b.progress_percent().total_cmp(&a.progress_percent())
            }),
        }
        books
    }
}

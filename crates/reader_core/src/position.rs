//! crates/reader_core/src/position.rs
//!
//! Tracks the reading position inside an open book.
//!
//! The tracker never persists anything itself: every successful move returns a
//! [`ProgressChanged`] event that the owner of the book collection applies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{Book, BookId};
use crate::page_index::{chapter_for_page, PageIndex};

/// Emitted by every successful navigation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressChanged {
    pub book_id: BookId,
    pub page: u32,
    pub chapter: usize,
    /// Scroll offset to restore in the chapter that became current.
    pub scroll_offset: f64,
}

/// The position within one open book.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionTracker {
    book_id: BookId,
    total_pages: u32,
    anchors: Vec<u32>,
    current_page: u32,
    current_chapter: usize,
    scroll_offsets: BTreeMap<usize, f64>,
}

impl PositionTracker {
    /// Seeds the tracker from the book's persisted progress.
    pub fn open(book: &Book) -> Self {
        let index = PageIndex::for_book(book);
        let total_pages = book.total_pages.max(1);
        let current_page = book.current_page.clamp(1, total_pages);
        let current_chapter = match book.last_read_chapter {
            Some(chapter) if chapter < index.len() => chapter,
            _ => index.chapter_for_page(current_page),
        };

        Self {
            book_id: book.id.clone(),
            total_pages,
            anchors: index.anchors().to_vec(),
            current_page,
            current_chapter,
            scroll_offsets: book.scroll_positions.clone(),
        }
    }

    pub fn book_id(&self) -> &BookId {
        &self.book_id
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn current_chapter(&self) -> usize {
        self.current_chapter
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn current_scroll(&self) -> f64 {
        self.scroll_offsets
            .get(&self.current_chapter)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn scroll_offsets(&self) -> &BTreeMap<usize, f64> {
        &self.scroll_offsets
    }

    /// Moves to `page`. Pages outside `1..=total_pages` are ignored.
    pub fn goto_page(&mut self, page: u32) -> Option<ProgressChanged> {
        if page < 1 || page > self.total_pages {
            return None;
        }
        self.current_page = page;
        if !self.anchors.is_empty() {
            self.current_chapter = chapter_for_page(&self.anchors, page);
        }
        Some(self.progress())
    }

    /// Moves to the start of `chapter`, restoring its saved scroll offset.
    /// Unknown chapters are ignored.
    pub fn goto_chapter(&mut self, chapter: usize) -> Option<ProgressChanged> {
        let start = *self.anchors.get(chapter)?;
        self.current_page = start.clamp(1, self.total_pages);
        self.current_chapter = chapter;
        self.scroll_offsets.entry(chapter).or_insert(0.0);
        Some(self.progress())
    }

    pub fn next_chapter(&mut self) -> Option<ProgressChanged> {
        self.goto_chapter(self.current_chapter.checked_add(1)?)
    }

    pub fn prev_chapter(&mut self) -> Option<ProgressChanged> {
        self.goto_chapter(self.current_chapter.checked_sub(1)?)
    }

    /// Stores the scroll offset of the current chapter.
    pub fn record_scroll(&mut self, offset: f64) {
        self.scroll_offsets
            .insert(self.current_chapter, offset.max(0.0));
    }

    pub fn progress(&self) -> ProgressChanged {
        ProgressChanged {
            book_id: self.book_id.clone(),
            page: self.current_page,
            chapter: self.current_chapter,
            scroll_offset: self.current_scroll(),
        }
    }
}

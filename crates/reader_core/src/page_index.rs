//! crates/reader_core/src/page_index.rs
//!
//! Resolves pages to chapters and synthesizes the page→content lookup of a book.
//!
//! A chapter covers every page from its anchor up to the page before the next
//! chapter's anchor (or up to the last page of the book). Chapters are never
//! split further, so every page of a chapter maps to the whole chapter content.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use tracing::debug;

use crate::domain::{Book, Chapter};

/// Returned for any page of a book that has no chapters.
pub const NO_CONTENT: &str = "No content available";

/// Returns the index of the chapter containing `page`.
///
/// Picks the greatest `i` with `anchors[i] <= page` whose successor (if any)
/// starts after `page`. Pages before the first anchor, out-of-order anchors
/// that match nothing, and empty anchor lists all resolve to chapter 0.
pub fn chapter_for_page(anchors: &[u32], page: u32) -> usize {
    let found = (0..anchors.len()).rev().find(|&i| {
        anchors[i] <= page && anchors.get(i + 1).map_or(true, |next| *next > page)
    });

    match found {
        Some(index) => index,
        None => {
            if let Some(first) = anchors.first() {
                debug!(page, first_anchor = first, "page matches no chapter; using chapter 0");
            }
            0
        }
    }
}

/// Page lookups over the chapters of one book.
#[derive(Debug, Clone)]
pub struct PageIndex<'a> {
    chapters: &'a [Chapter],
    anchors: Vec<u32>,
    total_pages: u32,
}

impl<'a> PageIndex<'a> {
    pub fn new(chapters: &'a [Chapter], total_pages: u32) -> Self {
        Self {
            chapters,
            anchors: chapters.iter().map(|chapter| chapter.start_page).collect(),
            total_pages,
        }
    }

    pub fn for_book(book: &'a Book) -> Self {
        Self::new(&book.chapters, book.total_pages)
    }

    pub fn anchors(&self) -> &[u32] {
        &self.anchors
    }

    pub fn chapters(&self) -> &'a [Chapter] {
        self.chapters
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn chapter_for_page(&self, page: u32) -> usize {
        chapter_for_page(&self.anchors, page)
    }

    /// The start page of a chapter, if it exists.
    pub fn start_page(&self, chapter: usize) -> Option<u32> {
        self.anchors.get(chapter).copied()
    }

    /// The pages covered by a chapter. Empty when the next chapter shares its anchor.
    pub fn page_range(&self, chapter: usize) -> Option<RangeInclusive<u32>> {
        let start = *self.anchors.get(chapter)?;
        let end = match self.anchors.get(chapter + 1) {
            Some(next) => next.saturating_sub(1),
            None => self.total_pages,
        };
        Some(start..=end)
    }

    /// The content shown for `page`.
    ///
    /// A chapter without inline content synthesizes `"Page N"`.
    pub fn content_for_page(&self, page: u32) -> Cow<'a, str> {
        if self.chapters.is_empty() {
            return Cow::Borrowed(NO_CONTENT);
        }
        let chapter = &self.chapters[self.chapter_for_page(page)];
        match chapter.content.as_deref() {
            Some(content) => Cow::Borrowed(content),
            None => Cow::Owned(format!("Page {page}")),
        }
    }

    /// The synthesized lookup for every page covered by some chapter.
    pub fn page_map(&self) -> BTreeMap<u32, Cow<'a, str>> {
        let mut pages = BTreeMap::new();
        for (index, chapter) in self.chapters.iter().enumerate() {
            let Some(range) = self.page_range(index) else {
                continue;
            };
            for page in range {
                let content = match chapter.content.as_deref() {
                    Some(content) => Cow::Borrowed(content),
                    None => Cow::Owned(format!("Page {page}")),
                };
                pages.insert(page, content);
            }
        }
        pages
    }
}

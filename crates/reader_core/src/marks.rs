//! crates/reader_core/src/marks.rs
//!
//! Bookmarks and annotations attached to a book.
//!
//! Bookmarks come in two forms. Legacy bookmarks are bare page numbers and are
//! identified by value; rich bookmarks record a chapter and scroll offset and are
//! identified by their insertion index. Annotations carry a generated id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::page_index::PageIndex;

/// Scroll distance within which a rich bookmark counts as "at" a position.
pub const NEAR_SCROLL_DISTANCE: f64 = 100.0;

//=========================================================================================
// Bookmarks
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bookmark {
    LegacyPage(u32),
    #[serde(rename_all = "camelCase")]
    Rich {
        chapter_index: usize,
        #[serde(default, alias = "scrollOffset")]
        scroll_position: f64,
        /// Snippet of the text at the bookmarked position.
        #[serde(default, alias = "snippet")]
        text: String,
        #[serde(default, alias = "timestamp")]
        date: DateTime<Utc>,
    },
}

impl Bookmark {
    pub fn rich(chapter_index: usize, scroll_position: f64, text: impl Into<String>, date: DateTime<Utc>) -> Self {
        Bookmark::Rich {
            chapter_index,
            scroll_position,
            text: text.into(),
            date,
        }
    }

    /// The page used to order the bookmark for display.
    pub fn display_page(&self, index: &PageIndex<'_>) -> u32 {
        match self {
            Bookmark::LegacyPage(page) => *page,
            Bookmark::Rich { chapter_index, .. } => index.start_page(*chapter_index).unwrap_or(1),
        }
    }

    fn scroll(&self) -> f64 {
        match self {
            Bookmark::LegacyPage(_) => 0.0,
            Bookmark::Rich { scroll_position, .. } => *scroll_position,
        }
    }
}

/// How a bookmark is addressed for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum BookmarkKey {
    /// A legacy bookmark, by page number.
    Page(u32),
    /// A rich bookmark, by insertion index.
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkStore(Vec<Bookmark>);

impl BookmarkStore {
    pub fn new(bookmarks: Vec<Bookmark>) -> Self {
        Self(bookmarks)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bookmarks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.0.iter()
    }

    fn key_of(&self, position: usize) -> BookmarkKey {
        match &self.0[position] {
            Bookmark::LegacyPage(page) => BookmarkKey::Page(*page),
            Bookmark::Rich { .. } => BookmarkKey::Index(position),
        }
    }

    /// Appends a bookmark. A legacy page that is already bookmarked is not added twice.
    pub fn add(&mut self, bookmark: Bookmark) -> BookmarkKey {
        if let Bookmark::LegacyPage(page) = bookmark {
            if self.0.contains(&Bookmark::LegacyPage(page)) {
                return BookmarkKey::Page(page);
            }
        }
        self.0.push(bookmark);
        self.key_of(self.0.len() - 1)
    }

    /// Removes the bookmark addressed by `key`. Returns false when nothing matched.
    ///
    /// An index key only removes a rich bookmark; legacy entries are removed by page.
    pub fn remove(&mut self, key: BookmarkKey) -> bool {
        match key {
            BookmarkKey::Page(page) => {
                let before = self.0.len();
                self.0.retain(|bookmark| *bookmark != Bookmark::LegacyPage(page));
                self.0.len() != before
            }
            BookmarkKey::Index(position) => match self.0.get(position) {
                Some(Bookmark::Rich { .. }) => {
                    self.0.remove(position);
                    true
                }
                _ => false,
            },
        }
    }

    /// Bookmarks with their keys, ordered for display by page then scroll offset.
    pub fn list(&self, index: &PageIndex<'_>) -> Vec<(BookmarkKey, &Bookmark)> {
        let mut entries: Vec<_> = self
            .0
            .iter()
            .enumerate()
            .map(|(position, bookmark)| (self.key_of(position), bookmark))
            .collect();
        entries.sort_by(|(_, a), (_, b)| {
            a.display_page(index)
                .cmp(&b.display_page(index))
                .then(a.scroll().total_cmp(&b.scroll()))
        });
        entries
    }

    /// The first rich bookmark close to a chapter position.
    pub fn find_near(&self, chapter: usize, offset: f64) -> Option<BookmarkKey> {
        self.0.iter().position(|bookmark| match bookmark {
            Bookmark::Rich {
                chapter_index,
                scroll_position,
                ..
            } => *chapter_index == chapter && (scroll_position - offset).abs() < NEAR_SCROLL_DISTANCE,
            Bookmark::LegacyPage(_) => false,
        })
        .map(BookmarkKey::Index)
    }

    /// Removes the rich bookmark near the position, or adds one. Returns true if added.
    pub fn toggle_at(&mut self, chapter: usize, offset: f64, text: impl Into<String>, now: DateTime<Utc>) -> bool {
        match self.find_near(chapter, offset) {
            Some(key) => {
                self.remove(key);
                false
            }
            None => {
                self.add(Bookmark::rich(chapter, offset, text, now));
                true
            }
        }
    }

    /// This store followed by the bookmarks of `other` it does not already hold.
    pub fn union(&self, other: &BookmarkStore) -> BookmarkStore {
        let mut merged = self.0.clone();
        for bookmark in &other.0 {
            if !merged.contains(bookmark) {
                merged.push(bookmark.clone());
            }
        }
        BookmarkStore(merged)
    }

    pub fn contains(&self, bookmark: &Bookmark) -> bool {
        self.0.contains(bookmark)
    }
}

//=========================================================================================
// Annotations
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Generated on creation; also generated when reading records that predate ids.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub page: u32,
    #[serde(default, alias = "highlight")]
    pub highlighted_text: String,
    #[serde(default, alias = "text")]
    pub note_text: String,
    #[serde(default, alias = "date")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationStore(Vec<Annotation>);

impl AnnotationStore {
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self(annotations)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    pub fn add(
        &mut self,
        page: u32,
        highlighted_text: impl Into<String>,
        note_text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.0.push(Annotation {
            id,
            page,
            highlighted_text: highlighted_text.into(),
            note_text: note_text.into(),
            timestamp: now,
        });
        id
    }

    /// Removes every annotation carrying `id`. Returns false when none did.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.0.len();
        self.0.retain(|annotation| annotation.id != id);
        self.0.len() != before
    }

    pub fn get(&self, id: Uuid) -> Option<&Annotation> {
        self.0.iter().find(|annotation| annotation.id == id)
    }

    /// Annotations ordered by page; annotations on the same page keep insertion order.
    pub fn list(&self) -> Vec<&Annotation> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by_key(|annotation| annotation.page);
        entries
    }

    pub fn on_page(&self, page: u32) -> impl Iterator<Item = &Annotation> {
        self.0.iter().filter(move |annotation| annotation.page == page)
    }

    /// This store followed by all of `other`. Order-dependent, duplicates are kept.
    pub fn concat(&self, other: &AnnotationStore) -> AnnotationStore {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().cloned());
        AnnotationStore(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Chapter;

    fn chapters() -> Vec<Chapter> {
        vec![Chapter::new("One", 1), Chapter::new("Two", 35)]
    }

    #[test]
    fn legacy_pages_are_deduplicated() {
        let mut store = BookmarkStore::default();
        assert_eq!(store.add(Bookmark::LegacyPage(15)), BookmarkKey::Page(15));
        store.add(Bookmark::LegacyPage(15));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn removal_dispatches_on_the_key_tag() {
        let now = Utc::now();
        let mut store = BookmarkStore::default();
        store.add(Bookmark::LegacyPage(67));
        let rich = store.add(Bookmark::rich(1, 200.0, "It was", now));
        assert_eq!(rich, BookmarkKey::Index(1));

        assert!(!store.remove(BookmarkKey::Index(0)), "index keys never remove legacy pages");
        assert!(store.remove(BookmarkKey::Index(1)));
        assert!(!store.remove(BookmarkKey::Page(3)));
        assert!(store.remove(BookmarkKey::Page(67)));
        assert!(store.is_empty());
    }

    #[test]
    fn list_orders_mixed_bookmarks_by_page() {
        let now = Utc::now();
        let chapters = chapters();
        let index = PageIndex::new(&chapters, 100);
        let mut store = BookmarkStore::default();
        store.add(Bookmark::LegacyPage(60));
        store.add(Bookmark::rich(1, 500.0, "b", now));
        store.add(Bookmark::rich(1, 10.0, "a", now));
        store.add(Bookmark::LegacyPage(5));

        let keys: Vec<_> = store.list(&index).into_iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec![
                BookmarkKey::Page(5),
                BookmarkKey::Index(2),
                BookmarkKey::Index(1),
                BookmarkKey::Page(60),
            ]
        );
    }

    #[test]
    fn toggle_adds_then_removes_near_a_position() {
        let now = Utc::now();
        let mut store = BookmarkStore::default();
        assert!(store.toggle_at(0, 300.0, "snippet", now));
        assert!(store.find_near(0, 350.0).is_some());
        assert!(store.find_near(0, 450.0).is_none());
        assert!(!store.toggle_at(0, 320.0, "snippet", now));
        assert!(store.is_empty());
    }

    #[test]
    fn both_bookmark_forms_read_from_json() {
        let json = r#"[15, {"chapterIndex": 2, "scrollPosition": 120, "text": "Jean", "date": "2024-01-01T00:00:00Z"}]"#;
        let store: BookmarkStore = serde_json::from_str(json).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains(&Bookmark::LegacyPage(15)));
        assert!(matches!(
            store.iter().nth(1),
            Some(Bookmark::Rich { chapter_index: 2, .. })
        ));
        assert_eq!(serde_json::to_value(&store).unwrap()[0], 15);
    }

    #[test]
    fn union_is_commutative_as_a_set() {
        let now = Utc::now();
        let a = BookmarkStore::new(vec![Bookmark::LegacyPage(1), Bookmark::rich(0, 5.0, "x", now)]);
        let b = BookmarkStore::new(vec![Bookmark::LegacyPage(2), Bookmark::LegacyPage(1)]);
        let ab = a.union(&b);
        let ba = b.union(&a);
        assert_eq!(ab.len(), 3);
        assert_eq!(ba.len(), 3);
        assert!(ab.iter().all(|bookmark| ba.contains(bookmark)));
    }

    #[test]
    fn annotations_are_removed_by_id() {
        let now = Utc::now();
        let mut store = AnnotationStore::default();
        let first = store.add(25, "Jean Valjean regarda...", "Important", now);
        let second = store.add(10, "La révolution...", "Context", now);

        assert_eq!(store.list()[0].id, second);
        assert!(store.remove(first));
        assert!(!store.remove(first));
        assert_eq!(store.len(), 1);
        assert_eq!(store.on_page(10).count(), 1);
    }

    #[test]
    fn legacy_annotations_get_ids() {
        let json = r#"[{"page": 25, "text": "Passage important", "highlight": "Jean Valjean regarda..."}]"#;
        let store: AnnotationStore = serde_json::from_str(json).unwrap();
        let annotation = store.iter().next().unwrap();
        assert_eq!(annotation.note_text, "Passage important");
        assert_eq!(annotation.highlighted_text, "Jean Valjean regarda...");
        assert!(!annotation.id.is_nil());
    }

    #[test]
    fn concatenation_keeps_order_and_duplicates() {
        let now = Utc::now();
        let mut a = AnnotationStore::default();
        a.add(1, "a", "", now);
        let b = a.clone();
        let merged = a.concat(&b);
        assert_eq!(merged.len(), 2);
        let (ab, ba) = (a.concat(&b).concat(&a), a.concat(&b.concat(&a)));
        assert_eq!(ab, ba);
    }
}

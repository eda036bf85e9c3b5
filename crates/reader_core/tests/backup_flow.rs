//! Saving, reloading, exporting and importing a library through the in-memory store.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use reader_core::backup::{export_json, parse_import};
use reader_core::memory::MemoryLocalStore;
use reader_core::session::SessionDraft;
use reader_core::{
    Bookmark, BookId, Book, Chapter, Dataset, Library, LibraryStore, LocalStore, NewBook,
    ReaderError, Theme,
};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, hour, 0, 0).unwrap()
}

fn sample_library() -> Library {
    let mut book = Book::manual(
        NewBook {
            title: "Middlemarch".into(),
            author: "George Eliot".into(),
            total_pages: 120,
            chapters: vec![
                Chapter::new("Prelude", 1).with_content("Who that cares much to know"),
                Chapter::new("Book One", 10).with_content("Miss Brooke had that kind of beauty"),
            ],
            ..Default::default()
        },
        at(8),
    )
    .unwrap();
    book.id = BookId::from("middlemarch");

    let mut library = Library::default();
    library.add_book(book);
    let id = BookId::from("middlemarch");
    library.add_bookmark(&id, Bookmark::LegacyPage(4), at(9)).unwrap();
    library
        .toggle_bookmark(&id, 1, 250.0, "Miss Brooke", at(9))
        .unwrap();
    library
        .add_annotation(&id, 12, "that kind of beauty", "irony?", at(9))
        .unwrap();
    library.record_session(SessionDraft {
        book_id: id,
        timestamp: at(10),
        duration_minutes: 25,
        pages_read: 11,
        chapter_id: 1,
    });
    library.theme_settings.default_theme = Theme::Sepia;
    library
}

async fn save_all(store: &LibraryStore, library: &Library, stamp: DateTime<Utc>) {
    store.save(Dataset::Books, library.books(), Some(stamp)).await.unwrap();
    store
        .save(Dataset::ReadingHistory, library.history(), Some(stamp))
        .await
        .unwrap();
    store
        .save(Dataset::AppSettings, &library.app_settings, None)
        .await
        .unwrap();
    store
        .save(Dataset::ThemeSettings, &library.theme_settings, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn a_saved_library_reloads_unchanged() {
    let store = LibraryStore::new(Arc::new(MemoryLocalStore::default()));
    let library = sample_library();
    save_all(&store, &library, at(11)).await;

    let reloaded = Library::from(store.load_snapshot().await.unwrap());
    assert_eq!(reloaded, library);
    assert_eq!(store.marker(Dataset::Books).await.unwrap(), Some(at(11)));
    assert_eq!(store.marker(Dataset::AppSettings).await.unwrap(), None);
}

#[tokio::test]
async fn an_empty_store_loads_defaults() {
    let store = LibraryStore::new(Arc::new(MemoryLocalStore::default()));
    let library = Library::from(store.load_snapshot().await.unwrap());
    assert!(library.books().is_empty());
    assert!(library.history().is_empty());
    assert_eq!(library.theme_settings.default_theme, Theme::Light);
}

#[tokio::test]
async fn legacy_records_still_load() {
    let local = Arc::new(MemoryLocalStore::default());
    local
        .set(
            Dataset::Books.key(),
            r#"[{"id": 17, "title": "Old", "totalPages": 30, "currentPage": 5,
                 "bookmarks": [3, 9], "annotations": [{"page": 2, "text": "note"}]}]"#,
        )
        .await
        .unwrap();
    local
        .set(
            Dataset::ReadingHistory.key(),
            r#"[{"id": 1, "bookId": 17, "date": "2024-03-01T09:00:00Z", "duration": 12, "pagesRead": 3}]"#,
        )
        .await
        .unwrap();

    let library = Library::from(LibraryStore::new(local).load_snapshot().await.unwrap());
    let book = library.book(&BookId::from("17")).unwrap();
    assert_eq!(book.current_page, 5);
    assert_eq!(book.bookmarks.len(), 2);
    assert_eq!(book.annotations.list()[0].note_text, "note");
    assert_eq!(library.history_for(&BookId::from("17")).len(), 1);
}

#[tokio::test]
async fn a_corrupt_dataset_fails_the_load() {
    let local = Arc::new(MemoryLocalStore::default());
    local.set(Dataset::Books.key(), "{not json").await.unwrap();

    let result = LibraryStore::new(local).load_snapshot().await;
    assert!(matches!(result, Err(ReaderError::Serialization(_))));
}

#[tokio::test]
async fn an_export_restores_into_a_fresh_store() {
    let library = sample_library();
    let exported = export_json(&library, at(12)).unwrap();

    let mut restored = Library::default();
    restored.apply_import(parse_import(&exported).unwrap());
    assert_eq!(restored, library);

    let store = LibraryStore::new(Arc::new(MemoryLocalStore::default()));
    save_all(&store, &restored, at(13)).await;
    let reloaded = Library::from(store.load_snapshot().await.unwrap());
    assert_eq!(reloaded.books(), library.books());
    assert_eq!(reloaded.history(), library.history());
}

//! crates/reader_core/src/sync.rs
//!
//! Reconciles the local book collection and reading history with the remote
//! document store.
//!
//! Books follow last-writer-wins at the dataset level, with per-book conflicts
//! surfaced for an explicit decision. The history is append-only and is merged
//! by session id, so it never conflicts.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{Book, BookId, ReadingSession};
use crate::error::{ReaderError, ReaderResult};
use crate::ports::{Dataset, PortError, RemoteDocument, RemoteStore};
use crate::store::LibraryStore;

/// True when the local copy should be pushed: the remote stamp is absent, or
/// the local stamp exists and is strictly newer.
pub fn is_local_newer(local: Option<DateTime<Utc>>, remote: Option<DateTime<Utc>>) -> bool {
    match (local, remote) {
        (_, None) => true,
        (Some(local), Some(remote)) => local > remote,
        (None, Some(_)) => false,
    }
}

fn is_set(stamp: DateTime<Utc>) -> bool {
    stamp.timestamp_millis() > 0
}

/// A book whose local and remote copies were modified at different times.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookConflict {
    pub id: BookId,
    pub local: Book,
    pub cloud: Book,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    KeepLocal,
    KeepCloud,
    Merge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BooksOutcome {
    Pushed,
    Pulled(Vec<Book>),
    Conflicts(Vec<BookConflict>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    Pushed,
    Merged(Vec<ReadingSession>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub books: BooksOutcome,
    pub history: HistoryOutcome,
}

/// Books present on both sides whose non-zero `lastModified` stamps differ.
pub fn find_conflicts(local: &[Book], cloud: &[Book]) -> Vec<BookConflict> {
    local
        .iter()
        .filter_map(|local_book| {
            let cloud_book = cloud.iter().find(|book| book.id == local_book.id)?;
            let differs = is_set(local_book.last_modified)
                && is_set(cloud_book.last_modified)
                && local_book.last_modified != cloud_book.last_modified;
            differs.then(|| BookConflict {
                id: local_book.id.clone(),
                local: local_book.clone(),
                cloud: cloud_book.clone(),
            })
        })
        .collect()
}

/// Local sessions followed by the remote sessions whose ids are not known locally.
pub fn merge_history(local: &[ReadingSession], cloud: &[ReadingSession]) -> Vec<ReadingSession> {
    let mut seen: HashSet<u64> = local.iter().map(|session| session.id).collect();
    let mut merged = local.to_vec();
    for session in cloud {
        if seen.insert(session.id) {
            merged.push(session.clone());
        }
    }
    merged
}

/// The cloud copy with the furthest page, both bookmark sets and all annotations.
pub fn merge_books(local: &Book, cloud: &Book, now: DateTime<Utc>) -> Book {
    let mut merged = cloud.clone();
    merged.current_page = local.current_page.max(cloud.current_page);
    merged.bookmarks = local.bookmarks.union(&cloud.bookmarks);
    merged.annotations = local.annotations.concat(&cloud.annotations);
    merged.touch(now);
    merged
}

impl Resolution {
    /// Whether the decision leaves a copy the remote store does not have yet.
    pub fn pushes(self) -> bool {
        matches!(self, Resolution::KeepLocal | Resolution::Merge)
    }
}

/// The copy of a conflicted book that a decision leaves in the library.
///
/// `current` is the local copy as it is now, which may be newer than the one
/// recorded in the conflict.
pub fn resolved_book(
    current: &Book,
    conflict: &BookConflict,
    resolution: Resolution,
    now: DateTime<Utc>,
) -> Book {
    match resolution {
        Resolution::KeepLocal => current.clone(),
        Resolution::KeepCloud => conflict.cloud.clone(),
        Resolution::Merge => merge_books(current, &conflict.cloud, now),
    }
}

/// The pulled collection with the local edits made while the pull was in flight
/// laid on top.
///
/// `snapshot` is the collection handed to [`SyncReconciler::sync`] and `current`
/// the collection now. Books added or changed since the snapshot keep their local
/// copy, and books deleted since the snapshot stay deleted.
pub fn rebase_pull(snapshot: &[Book], current: &[Book], pulled: Vec<Book>) -> Vec<Book> {
    let mut books = pulled;
    books.retain(|book| {
        let deleted = snapshot.iter().any(|before| before.id == book.id)
            && !current.iter().any(|now| now.id == book.id);
        !deleted
    });
    for book in current {
        let unchanged = snapshot.iter().any(|before| before == book);
        if unchanged {
            continue;
        }
        match books.iter_mut().find(|pulled| pulled.id == book.id) {
            Some(slot) => *slot = book.clone(),
            None => books.push(book.clone()),
        }
    }
    books
}

fn decode<T: serde::de::DeserializeOwned>(document: RemoteDocument) -> ReaderResult<T> {
    Ok(serde_json::from_value(document.data)?)
}

#[derive(Clone)]
pub struct SyncReconciler {
    remote: Arc<dyn RemoteStore>,
    store: LibraryStore,
}

impl SyncReconciler {
    pub fn new(remote: Arc<dyn RemoteStore>, store: LibraryStore) -> Self {
        Self { remote, store }
    }

    async fn push<T: Serialize + ?Sized>(
        &self,
        dataset: Dataset,
        value: &T,
        now: DateTime<Utc>,
    ) -> ReaderResult<()> {
        let document = RemoteDocument {
            data: serde_json::to_value(value)?,
            last_modified: Some(now),
        };
        if !self.remote.save(dataset, &document).await? {
            return Err(ReaderError::Persistence(PortError::Unexpected(format!(
                "remote store refused {}",
                dataset.remote_name()
            ))));
        }
        self.store.set_marker(dataset, now).await?;
        info!(dataset = dataset.remote_name(), "Pushed local data");
        Ok(())
    }

    /// Runs one reconciliation of both datasets.
    ///
    /// Pulled and merged data is written to the local store before it is returned;
    /// the caller still owns replacing its in-memory copy.
    pub async fn sync(
        &self,
        books: &[Book],
        history: &[ReadingSession],
        now: DateTime<Utc>,
    ) -> ReaderResult<SyncOutcome> {
        let (cloud_books, cloud_history) = futures::try_join!(
            self.remote.load(Dataset::Books),
            self.remote.load(Dataset::ReadingHistory),
        )?;
        let (books_marker, history_marker) = futures::try_join!(
            self.store.marker(Dataset::Books),
            self.store.marker(Dataset::ReadingHistory),
        )?;

        let books = match cloud_books {
            Some(document) if !is_local_newer(books_marker, document.last_modified) => {
                let stamp = document.last_modified;
                let cloud: Vec<Book> = decode(document)?;
                let conflicts = find_conflicts(books, &cloud);
                if conflicts.is_empty() {
                    self.store.save(Dataset::Books, &cloud, stamp).await?;
                    info!(count = cloud.len(), "Pulled books from the remote store");
                    BooksOutcome::Pulled(cloud)
                } else {
                    warn!(count = conflicts.len(), "Book conflicts need a decision");
                    BooksOutcome::Conflicts(conflicts)
                }
            }
            _ => {
                self.push(Dataset::Books, books, now).await?;
                BooksOutcome::Pushed
            }
        };

        let history = match cloud_history {
            Some(document) if !is_local_newer(history_marker, document.last_modified) => {
                let stamp = document.last_modified;
                let cloud: Vec<ReadingSession> = decode(document)?;
                let merged = merge_history(history, &cloud);
                self.store
                    .save(Dataset::ReadingHistory, &merged, stamp)
                    .await?;
                info!(count = merged.len(), "Merged reading history");
                HistoryOutcome::Merged(merged)
            }
            _ => {
                self.push(Dataset::ReadingHistory, history, now).await?;
                HistoryOutcome::Pushed
            }
        };

        Ok(SyncOutcome { books, history })
    }

    /// Pushes a collection holding a resolved book. `KeepCloud` has nothing to push.
    ///
    /// The caller builds `books` from its current collection, so edits made since
    /// the conflict was found are part of the push.
    pub async fn publish_resolution(
        &self,
        books: &[Book],
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> ReaderResult<()> {
        if resolution.pushes() {
            self.push(Dataset::Books, books, now).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewBook;
    use crate::marks::Bookmark;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn book(id: &str, page: u32, modified: DateTime<Utc>) -> Book {
        let mut book = Book::manual(
            NewBook {
                title: id.into(),
                total_pages: 100,
                ..Default::default()
            },
            modified,
        )
        .unwrap();
        book.id = BookId::from(id);
        book.current_page = page;
        book
    }

    fn session(id: u64) -> ReadingSession {
        ReadingSession {
            id,
            book_id: BookId::from("a"),
            timestamp: day(1),
            duration_minutes: 5,
            pages_read: 2,
            chapter_id: 0,
        }
    }

    #[test]
    fn local_is_newer_only_when_strictly_newer() {
        assert!(is_local_newer(None, None));
        assert!(is_local_newer(Some(day(1)), None));
        assert!(!is_local_newer(None, Some(day(1))));
        assert!(!is_local_newer(Some(day(1)), Some(day(5))));
        assert!(!is_local_newer(Some(day(5)), Some(day(5))));
        assert!(is_local_newer(Some(day(6)), Some(day(5))));
    }

    #[test]
    fn conflicts_need_two_differing_stamps() {
        let local = vec![book("a", 1, day(1)), book("b", 1, day(2)), book("c", 1, DateTime::default())];
        let cloud = vec![book("a", 9, day(5)), book("b", 1, day(2)), book("c", 1, day(3))];
        let conflicts = find_conflicts(&local, &cloud);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, BookId::from("a"));
        assert_eq!(conflicts[0].cloud.current_page, 9);
    }

    #[test]
    fn history_merge_keeps_local_and_adds_unknown_ids() {
        let merged = merge_history(&[session(1), session(2)], &[session(2), session(3)]);
        let ids: Vec<_> = merged.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn merge_takes_the_furthest_page_and_unions_bookmarks() {
        let mut local = book("a", 40, day(1));
        local.bookmarks.add(Bookmark::LegacyPage(3));
        local.bookmarks.add(Bookmark::LegacyPage(7));
        local.annotations.add(5, "hl", "local", day(1));
        let mut cloud = book("a", 25, day(5));
        cloud.title = "Cloud title".into();
        cloud.bookmarks.add(Bookmark::LegacyPage(7));
        cloud.bookmarks.add(Bookmark::LegacyPage(9));
        cloud.annotations.add(5, "hl", "cloud", day(5));

        let merged = merge_books(&local, &cloud, day(6));
        assert_eq!(merged.title, "Cloud title");
        assert_eq!(merged.current_page, 40);
        assert_eq!(merged.bookmarks.len(), 3);
        assert_eq!(merged.annotations.len(), 2);
        assert_eq!(merged.last_modified, day(6));

        let reversed = merge_books(&cloud, &local, day(6));
        for bookmark in merged.bookmarks.iter() {
            assert!(reversed.bookmarks.contains(bookmark));
        }
        assert_eq!(reversed.bookmarks.len(), merged.bookmarks.len());
    }

    #[test]
    fn resolving_starts_from_the_current_local_copy() {
        let conflict = BookConflict {
            id: BookId::from("a"),
            local: book("a", 10, day(1)),
            cloud: book("a", 30, day(5)),
        };
        let mut current = book("a", 55, day(4));
        current.bookmarks.add(Bookmark::LegacyPage(50));

        let kept = resolved_book(&current, &conflict, Resolution::KeepLocal, day(6));
        assert_eq!(kept, current);

        let cloud = resolved_book(&current, &conflict, Resolution::KeepCloud, day(6));
        assert_eq!(cloud.current_page, 30);

        let merged = resolved_book(&current, &conflict, Resolution::Merge, day(6));
        assert_eq!(merged.current_page, 55);
        assert!(merged.bookmarks.contains(&Bookmark::LegacyPage(50)));
        assert_eq!(merged.last_modified, day(6));

        assert!(Resolution::KeepLocal.pushes());
        assert!(Resolution::Merge.pushes());
        assert!(!Resolution::KeepCloud.pushes());
    }

    #[test]
    fn a_pull_keeps_edits_made_while_it_was_in_flight() {
        let snapshot = vec![book("a", 1, day(1)), book("b", 1, day(1))];
        let mut edited = book("a", 12, day(3));
        edited.title = "Edited".into();
        let current = vec![edited.clone(), book("c", 1, day(3))];
        let pulled = vec![book("a", 5, day(2)), book("b", 8, day(2)), book("d", 1, day(2))];

        let books = rebase_pull(&snapshot, &current, pulled);
        let ids: Vec<_> = books.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "c"]);
        assert_eq!(books[0], edited);
    }

    #[test]
    fn a_pull_with_no_local_edits_is_taken_as_is() {
        let snapshot = vec![book("a", 1, day(1))];
        let pulled = vec![book("a", 5, day(2)), book("b", 2, day(2))];
        assert_eq!(rebase_pull(&snapshot, &snapshot, pulled.clone()), pulled);
    }
}

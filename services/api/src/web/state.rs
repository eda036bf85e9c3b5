//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-book reader state.
//!
//! Lock order is `readers`, then `library`, then `conflicts`. Writes to the
//! local store run in spawned tasks so navigation never waits on persistence.

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::web::{
    protocol::{ConflictSummary, ServerMessage, SyncReport},
    reader_task::flush_timer,
};
use chrono::Utc;
use reader_core::domain::{Book, BookId, ReadingSession};
use reader_core::error::{ReaderError, ReaderResult};
use reader_core::library::Library;
use reader_core::ports::{ContentExtractor, Dataset};
use reader_core::position::{PositionTracker, ProgressChanged};
use reader_core::session::{SessionDraft, SessionRecorder};
use reader_core::store::LibraryStore;
use reader_core::sync::{
    merge_history, rebase_pull, resolved_book, BookConflict, BooksOutcome, HistoryOutcome,
    Resolution, SyncReconciler,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const NOTIFICATION_CAPACITY: usize = 64;

//=========================================================================================
// OpenReader (Specific to One Open Book)
//=========================================================================================

/// The reading state of a book between `open` and `close`.
pub struct OpenReader {
    pub tracker: PositionTracker,
    pub recorder: SessionRecorder,
    /// Stops the book's session flush timer.
    pub cancellation_token: CancellationToken,
}

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub store: LibraryStore,
    /// `None` when no remote store is configured.
    pub sync: Option<SyncReconciler>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub library: Mutex<Library>,
    pub readers: Mutex<HashMap<BookId, OpenReader>>,
    pub conflicts: Mutex<Vec<BookConflict>>,
    pub notifications: broadcast::Sender<ServerMessage>,
    /// Cancelled on server shutdown; every timer token is a child of it.
    pub shutdown: CancellationToken,
    persist_lock: Mutex<()>,
}

impl AppState {
    /// Builds the state from whatever the local store currently holds.
    pub async fn load(
        config: Arc<Config>,
        store: LibraryStore,
        sync: Option<SyncReconciler>,
        extractor: Arc<dyn ContentExtractor>,
    ) -> ApiResult<Self> {
        let snapshot = store.load_snapshot().await?;
        info!(
            books = snapshot.books.len(),
            sessions = snapshot.history.len(),
            "Library loaded from the local store."
        );
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Ok(Self {
            config,
            store,
            sync,
            extractor,
            library: Mutex::new(Library::from(snapshot)),
            readers: Mutex::new(HashMap::new()),
            conflicts: Mutex::new(Vec::new()),
            notifications,
            shutdown: CancellationToken::new(),
            persist_lock: Mutex::new(()),
        })
    }

    pub fn notify(&self, message: ServerMessage) {
        // Nobody listening is not an error.
        let _ = self.notifications.send(message);
    }

    //-------------------------------------------------------------------------------------
    // Persistence
    //-------------------------------------------------------------------------------------

    async fn save_dataset(&self, dataset: Dataset) -> ReaderResult<()> {
        let value = {
            let library = self.library.lock().await;
            match dataset {
                Dataset::Books => serde_json::to_value(library.books())?,
                Dataset::ReadingHistory => serde_json::to_value(library.history())?,
                Dataset::AppSettings => serde_json::to_value(&library.app_settings)?,
                Dataset::ThemeSettings => serde_json::to_value(&library.theme_settings)?,
            }
        };
        self.store.save(dataset, &value, Some(Utc::now())).await
    }

    /// Writes the current state of a dataset in the background.
    ///
    /// Writes are serialised and each one reads the latest in-memory state, so the
    /// last write always carries the newest data.
    pub fn persist(self: &Arc<Self>, dataset: Dataset) {
        let app_state = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = app_state.persist_lock.lock().await;
            if let Err(e) = app_state.save_dataset(dataset).await {
                warn!(dataset = dataset.key(), "Background write failed: {}", e);
                app_state.notify(ServerMessage::PersistenceFailed {
                    dataset: dataset.key().to_string(),
                    message: e.to_string(),
                });
            }
        });
    }

    /// Writes every dataset and waits for the writes to finish.
    pub async fn flush_all(&self) -> ReaderResult<()> {
        let _guard = self.persist_lock.lock().await;
        for dataset in [
            Dataset::Books,
            Dataset::ReadingHistory,
            Dataset::AppSettings,
            Dataset::ThemeSettings,
        ] {
            self.save_dataset(dataset).await?;
        }
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Reading
    //-------------------------------------------------------------------------------------

    /// Starts reading a book: seeds its position and starts its flush timer.
    /// Opening an open book returns its current position.
    pub async fn open_book(self: &Arc<Self>, id: &BookId) -> ApiResult<ProgressChanged> {
        let mut readers = self.readers.lock().await;
        if let Some(reader) = readers.get(id) {
            return Ok(reader.tracker.progress());
        }
        let tracker = {
            let library = self.library.lock().await;
            PositionTracker::open(library.book(id)?)
        };

        let mut recorder = SessionRecorder::new(id.clone(), self.config.session_flush_interval);
        recorder.start(Utc::now(), tracker.current_page(), tracker.current_chapter());
        let cancellation_token = self.shutdown.child_token();
        tokio::spawn(flush_timer(
            Arc::clone(self),
            id.clone(),
            cancellation_token.clone(),
        ));

        let progress = tracker.progress();
        readers.insert(
            id.clone(),
            OpenReader {
                tracker,
                recorder,
                cancellation_token,
            },
        );
        info!(book_id = %id, page = progress.page, "Book opened.");
        Ok(progress)
    }

    /// Stops reading a book and records the final session, if any pages were read.
    pub async fn close_book(self: &Arc<Self>, id: &BookId) -> ApiResult<Option<ReadingSession>> {
        let Some(mut reader) = self.readers.lock().await.remove(id) else {
            return Ok(None);
        };
        reader.cancellation_token.cancel();
        info!(book_id = %id, "Book closed.");
        match reader.recorder.close(Utc::now()) {
            Some(draft) => Ok(Some(self.record_session(draft).await)),
            None => Ok(None),
        }
    }

    /// Closes every open book.
    pub async fn close_all(self: &Arc<Self>) {
        let ids: Vec<BookId> = self.readers.lock().await.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.close_book(&id).await {
                warn!(book_id = %id, "Failed to close book: {}", e);
            }
        }
    }

    pub async fn record_session(self: &Arc<Self>, draft: SessionDraft) -> ReadingSession {
        let session = self.library.lock().await.record_session(draft).clone();
        info!(
            book_id = %session.book_id,
            pages = session.pages_read,
            minutes = session.duration_minutes,
            "Reading session recorded."
        );
        self.persist(Dataset::ReadingHistory);
        self.notify(ServerMessage::SessionRecorded {
            session: session.clone(),
        });
        session
    }

    async fn not_open(&self, id: &BookId) -> ApiError {
        match self.library.lock().await.book(id) {
            Ok(_) => ApiError::BadRequest(format!("Book {} is not open", id)),
            Err(e) => e.into(),
        }
    }

    /// Applies one navigation step to an open book.
    ///
    /// A step that was ignored (out of range) leaves everything untouched and
    /// returns the unchanged position.
    pub async fn navigate<F>(self: &Arc<Self>, id: &BookId, step: F) -> ApiResult<ProgressChanged>
    where
        F: FnOnce(&mut PositionTracker) -> Option<ProgressChanged>,
    {
        let mut readers = self.readers.lock().await;
        let Some(reader) = readers.get_mut(id) else {
            drop(readers);
            return Err(self.not_open(id).await);
        };
        let Some(event) = step(&mut reader.tracker) else {
            return Ok(reader.tracker.progress());
        };

        reader.recorder.observe(event.page, event.chapter);
        let offsets: Vec<(usize, f64)> = reader
            .tracker
            .scroll_offsets()
            .iter()
            .map(|(chapter, offset)| (*chapter, *offset))
            .collect();
        self.library
            .lock()
            .await
            .apply_progress(&event, offsets, Utc::now())?;
        drop(readers);

        self.persist(Dataset::Books);
        Ok(event)
    }

    /// The live position of an open book, or the persisted one otherwise.
    pub async fn position(&self, id: &BookId) -> ApiResult<ProgressChanged> {
        if let Some(reader) = self.readers.lock().await.get(id) {
            return Ok(reader.tracker.progress());
        }
        let library = self.library.lock().await;
        Ok(PositionTracker::open(library.book(id)?).progress())
    }

    /// Runs a mutation against the library and persists the touched dataset.
    pub async fn mutate<T, F>(self: &Arc<Self>, dataset: Dataset, change: F) -> ApiResult<T>
    where
        F: FnOnce(&mut Library) -> ReaderResult<T>,
    {
        let value = change(&mut *self.library.lock().await)?;
        self.persist(dataset);
        Ok(value)
    }

    pub async fn book(&self, id: &BookId) -> ApiResult<Book> {
        Ok(self.library.lock().await.book(id)?.clone())
    }

    //-------------------------------------------------------------------------------------
    // Sync
    //-------------------------------------------------------------------------------------

    fn reconciler(&self) -> ApiResult<&SyncReconciler> {
        self.sync
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("No remote store is configured".to_string()))
    }

    /// Reconciles with the remote store and applies what came back.
    ///
    /// The library stays unlocked while the remote store is reached, so what came
    /// back is laid over the library as it is now rather than replacing it.
    pub async fn run_sync(self: &Arc<Self>) -> ApiResult<SyncReport> {
        let sync = self.reconciler()?;
        let (books, history) = {
            let library = self.library.lock().await;
            (library.books().to_vec(), library.history().to_vec())
        };

        let outcome = match sync.sync(&books, &history, Utc::now()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Sync failed: {}", e);
                self.notify(ServerMessage::SyncFailed {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };
        let report = SyncReport::new(&outcome.books, &outcome.history);

        {
            let mut library = self.library.lock().await;
            if let BooksOutcome::Pulled(pulled) = &outcome.books {
                let rebased = rebase_pull(&books, library.books(), pulled.clone());
                if &rebased != pulled {
                    self.persist(Dataset::Books);
                }
                library.replace_books(rebased);
            }
            if let HistoryOutcome::Merged(merged) = &outcome.history {
                let combined = merge_history(library.history(), merged);
                if combined.len() != merged.len() {
                    self.persist(Dataset::ReadingHistory);
                }
                library.replace_history(combined);
            }
        }

        let mut conflicts = self.conflicts.lock().await;
        match outcome.books {
            BooksOutcome::Conflicts(found) => {
                *conflicts = found;
                self.notify(ServerMessage::SyncConflicts {
                    conflicts: report.conflicts.clone(),
                });
            }
            _ => {
                conflicts.clear();
                self.notify(ServerMessage::SyncCompleted {
                    report: report.clone(),
                });
            }
        }
        info!(books = ?report.books, history = ?report.history, "Sync finished.");
        Ok(report)
    }

    pub async fn pending_conflicts(&self) -> Vec<ConflictSummary> {
        self.conflicts
            .lock()
            .await
            .iter()
            .map(ConflictSummary::from)
            .collect()
    }

    /// Applies a decision to one pending conflict and returns the resulting book.
    ///
    /// The decision is taken on the book as it is now, and only that book is
    /// replaced, so edits made while the remote store is reached are kept.
    pub async fn resolve_conflict(
        self: &Arc<Self>,
        id: &BookId,
        resolution: Resolution,
    ) -> ApiResult<Book> {
        let sync = self.reconciler()?;
        let conflict = self
            .conflicts
            .lock()
            .await
            .iter()
            .find(|conflict| &conflict.id == id)
            .cloned()
            .ok_or_else(|| ReaderError::NotFound(id.clone()))?;

        let now = Utc::now();
        let (resolved, collection) = {
            let library = self.library.lock().await;
            let resolved = resolved_book(library.book(id)?, &conflict, resolution, now);
            let collection: Vec<Book> = library
                .books()
                .iter()
                .map(|book| if &book.id == id { resolved.clone() } else { book.clone() })
                .collect();
            (resolved, collection)
        };
        sync.publish_resolution(&collection, resolution, now).await?;

        self.library.lock().await.replace_book(resolved.clone());
        self.persist(Dataset::Books);
        self.conflicts
            .lock()
            .await
            .retain(|conflict| &conflict.id != id);
        info!(book_id = %id, ?resolution, "Conflict resolved.");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::extractor::TextExtractor;
    use crate::web::rest::backup::import_library;
    use async_trait::async_trait;
    use axum::extract::State;
    use chrono::{DateTime, TimeZone};
    use reader_core::backup::export_json;
    use reader_core::domain::NewBook;
    use reader_core::marks::Bookmark;
    use reader_core::memory::{MemoryLocalStore, MemoryRemoteStore};
    use reader_core::ports::{PortResult, RemoteDocument, RemoteStore};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::{Notify, Semaphore};
    use tracing::Level;

    /// A remote store whose calls can be held open until the test lets them through.
    struct GatedRemote {
        inner: MemoryRemoteStore,
        gated: AtomicBool,
        entered: Notify,
        release: Semaphore,
    }

    impl GatedRemote {
        fn new(inner: MemoryRemoteStore) -> Self {
            Self {
                inner,
                gated: AtomicBool::new(false),
                entered: Notify::new(),
                release: Semaphore::new(0),
            }
        }

        fn hold(&self) {
            self.gated.store(true, Ordering::SeqCst);
        }

        fn let_through(&self) {
            self.gated.store(false, Ordering::SeqCst);
            self.release.add_permits(16);
        }

        async fn pass(&self) {
            if self.gated.load(Ordering::SeqCst) {
                self.entered.notify_one();
                if let Ok(permit) = self.release.acquire().await {
                    permit.forget();
                }
            }
        }
    }

    #[async_trait]
    impl RemoteStore for GatedRemote {
        async fn load(&self, dataset: Dataset) -> PortResult<Option<RemoteDocument>> {
            self.pass().await;
            self.inner.load(dataset).await
        }

        async fn save(&self, dataset: Dataset, document: &RemoteDocument) -> PortResult<bool> {
            self.pass().await;
            self.inner.save(dataset, document).await
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn book(id: &str, page: u32, modified: DateTime<Utc>) -> Book {
        let mut book = Book::manual(
            NewBook {
                title: format!("Book {id}"),
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
            duration_minutes: 10,
            pages_read: 3,
            chapter_id: 0,
        }
    }

    fn document<T: serde::Serialize>(value: &T, stamp: DateTime<Utc>) -> RemoteDocument {
        RemoteDocument {
            data: serde_json::to_value(value).unwrap(),
            last_modified: Some(stamp),
        }
    }

    fn config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            log_level: Level::INFO,
            cors_origin: "*".to_string(),
            remote: None,
            session_flush_interval: Duration::ZERO,
            session_check_interval: Duration::from_secs(1),
            auto_sync_interval: Duration::from_secs(60),
            words_per_page: 250,
        }
    }

    async fn app_state(
        books: Vec<Book>,
        history: Vec<ReadingSession>,
        remote: Option<Arc<GatedRemote>>,
    ) -> Arc<AppState> {
        let store = LibraryStore::new(Arc::new(MemoryLocalStore::default()));
        store.save(Dataset::Books, &books, Some(day(2))).await.unwrap();
        store
            .save(Dataset::ReadingHistory, &history, Some(day(2)))
            .await
            .unwrap();
        let sync = remote.map(|remote| {
            let remote: Arc<dyn RemoteStore> = remote;
            SyncReconciler::new(remote, store.clone())
        });
        let state = AppState::load(
            Arc::new(config()),
            store,
            sync,
            Arc::new(TextExtractor::new(250)),
        )
        .await
        .unwrap();
        Arc::new(state)
    }

    #[tokio::test]
    async fn navigation_moves_the_book_and_counts_pages() {
        let state = app_state(vec![book("a", 1, day(1))], vec![], None).await;
        let id = BookId::from("a");
        state.open_book(&id).await.unwrap();

        let progress = state.navigate(&id, |tracker| tracker.goto_page(7)).await.unwrap();
        assert_eq!(progress.page, 7);
        assert_eq!(state.book(&id).await.unwrap().current_page, 7);
        assert_eq!(state.readers.lock().await[&id].recorder.pending_pages(), 6);

        let unchanged = state.navigate(&id, |tracker| tracker.goto_page(500)).await.unwrap();
        assert_eq!(unchanged.page, 7);
        assert_eq!(state.readers.lock().await[&id].recorder.pending_pages(), 6);
    }

    #[tokio::test]
    async fn navigating_a_closed_book_is_rejected() {
        let state = app_state(vec![book("a", 1, day(1))], vec![], None).await;

        let closed = state.navigate(&BookId::from("a"), |tracker| tracker.goto_page(2)).await;
        assert!(matches!(closed, Err(ApiError::BadRequest(_))));
        let unknown = state.navigate(&BookId::from("nope"), |tracker| tracker.goto_page(2)).await;
        assert!(matches!(unknown, Err(ApiError::Reader(ReaderError::NotFound(_)))));
    }

    #[tokio::test]
    async fn closing_a_book_stops_its_timer_and_records_the_session() {
        let state = app_state(vec![book("a", 1, day(1))], vec![], None).await;
        let id = BookId::from("a");
        state.open_book(&id).await.unwrap();
        state.navigate(&id, |tracker| tracker.goto_page(5)).await.unwrap();
        let token = state.readers.lock().await[&id].cancellation_token.clone();

        let session = state.close_book(&id).await.unwrap().unwrap();
        assert_eq!(session.pages_read, 4);
        assert_eq!(session.book_id, id);
        assert!(token.is_cancelled());
        assert!(state.readers.lock().await.is_empty());
        assert_eq!(state.library.lock().await.history().len(), 1);

        assert!(state.close_book(&id).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn the_flush_timer_records_sessions_while_the_book_is_open() {
        let state = app_state(vec![book("a", 1, day(1))], vec![], None).await;
        let id = BookId::from("a");
        let mut notifications = state.notifications.subscribe();
        state.open_book(&id).await.unwrap();
        state.navigate(&id, |tracker| tracker.goto_page(4)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(state.library.lock().await.history().len(), 1);
        assert!(matches!(
            notifications.recv().await,
            Ok(ServerMessage::SessionRecorded { .. })
        ));

        // Nothing left to flush, so closing adds no session.
        assert!(state.close_book(&id).await.unwrap().is_none());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(state.library.lock().await.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn the_flush_timer_exits_once_cancelled_or_closed() {
        let state = app_state(vec![book("a", 1, day(1))], vec![], None).await;
        let id = BookId::from("a");

        let token = CancellationToken::new();
        let cancelled = tokio::spawn(flush_timer(Arc::clone(&state), id.clone(), token.clone()));
        token.cancel();
        assert!(tokio::time::timeout(Duration::from_secs(5), cancelled).await.is_ok());

        // A timer for a book that is not open stops on its first tick.
        let orphan = tokio::spawn(flush_timer(state, id, CancellationToken::new()));
        assert!(tokio::time::timeout(Duration::from_secs(5), orphan).await.is_ok());
    }

    #[tokio::test]
    async fn a_sync_pulls_newer_cloud_books() {
        let cloud = vec![book("a", 30, day(1)), book("c", 1, day(4))];
        let remote = Arc::new(GatedRemote::new(MemoryRemoteStore::with_document(
            Dataset::Books,
            document(&cloud, day(5)),
        )));
        let state = app_state(vec![book("a", 1, day(1))], vec![], Some(remote)).await;

        state.run_sync().await.unwrap();
        let library = state.library.lock().await;
        assert_eq!(library.books(), cloud.as_slice());
        drop(library);
        assert!(state.pending_conflicts().await.is_empty());
    }

    #[tokio::test]
    async fn a_sync_that_finds_conflicts_keeps_them_pending() {
        let remote = Arc::new(GatedRemote::new(MemoryRemoteStore::with_document(
            Dataset::Books,
            document(&vec![book("a", 30, day(5))], day(5)),
        )));
        let local = vec![book("a", 60, day(2))];
        let state = app_state(local.clone(), vec![], Some(remote)).await;

        state.run_sync().await.unwrap();
        let pending = state.pending_conflicts().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(state.library.lock().await.books(), local.as_slice());
    }

    #[tokio::test]
    async fn books_edited_while_a_pull_is_in_flight_keep_their_edits() {
        let cloud = vec![book("a", 30, day(1)), book("c", 1, day(4))];
        let remote = Arc::new(GatedRemote::new(MemoryRemoteStore::with_document(
            Dataset::Books,
            document(&cloud, day(5)),
        )));
        let state = app_state(vec![book("a", 1, day(1))], vec![], Some(remote.clone())).await;
        let id = BookId::from("a");

        remote.hold();
        let sync = tokio::spawn({
            let state = Arc::clone(&state);
            async move { state.run_sync().await }
        });
        remote.entered.notified().await;
        state
            .library
            .lock()
            .await
            .add_bookmark(&id, Bookmark::LegacyPage(9), day(3))
            .unwrap();
        remote.let_through();
        sync.await.unwrap().unwrap();

        let library = state.library.lock().await;
        assert_eq!(library.books().len(), 2);
        assert!(library.book(&id).unwrap().bookmarks.contains(&Bookmark::LegacyPage(9)));
        assert!(library.book(&BookId::from("c")).is_ok());
    }

    #[tokio::test]
    async fn sessions_recorded_while_history_merges_are_kept() {
        let remote = Arc::new(GatedRemote::new(MemoryRemoteStore::with_document(
            Dataset::ReadingHistory,
            document(&vec![session(50)], day(5)),
        )));
        let state = app_state(vec![book("a", 1, day(1))], vec![session(1)], Some(remote.clone())).await;

        remote.hold();
        let sync = tokio::spawn({
            let state = Arc::clone(&state);
            async move { state.run_sync().await }
        });
        remote.entered.notified().await;
        state.library.lock().await.record_session(SessionDraft {
            book_id: BookId::from("a"),
            timestamp: day(6),
            duration_minutes: 4,
            pages_read: 2,
            chapter_id: 0,
        });
        remote.let_through();
        sync.await.unwrap().unwrap();

        let library = state.library.lock().await;
        let ids: Vec<u64> = library.history().iter().map(|session| session.id).collect();
        assert_eq!(ids, vec![1, 2, 50]);
    }

    #[tokio::test]
    async fn books_added_while_a_resolution_is_pushed_survive_it() {
        let mut cloud_copy = book("a", 30, day(5));
        cloud_copy.bookmarks.add(Bookmark::LegacyPage(15));
        let remote = Arc::new(GatedRemote::new(MemoryRemoteStore::with_document(
            Dataset::Books,
            document(&vec![cloud_copy], day(5)),
        )));
        let state = app_state(vec![book("a", 60, day(2))], vec![], Some(remote.clone())).await;
        state.run_sync().await.unwrap();
        assert_eq!(state.pending_conflicts().await.len(), 1);

        remote.hold();
        let resolve = tokio::spawn({
            let state = Arc::clone(&state);
            async move { state.resolve_conflict(&BookId::from("a"), Resolution::Merge).await }
        });
        remote.entered.notified().await;
        state
            .mutate(Dataset::Books, |library| {
                library.add_book(book("b", 1, day(6)));
                Ok(())
            })
            .await
            .unwrap();
        remote.let_through();
        let merged = resolve.await.unwrap().unwrap();

        assert_eq!(merged.current_page, 60);
        assert_eq!(merged.bookmarks.len(), 1);
        let library = state.library.lock().await;
        assert_eq!(library.books().len(), 2);
        assert_eq!(library.book(&BookId::from("a")).unwrap(), &merged);
        assert!(library.book(&BookId::from("b")).is_ok());
        drop(library);
        assert!(state.pending_conflicts().await.is_empty());
    }

    #[tokio::test]
    async fn importing_closes_open_books_first() {
        let state = app_state(vec![book("a", 1, day(1))], vec![], None).await;
        let id = BookId::from("a");
        state.open_book(&id).await.unwrap();
        state.navigate(&id, |tracker| tracker.goto_page(3)).await.unwrap();
        let token = state.readers.lock().await[&id].cancellation_token.clone();

        let mut incoming = Library::default();
        incoming.add_book(book("z", 1, day(3)));
        let body = export_json(&incoming, day(4)).unwrap();
        import_library(State(Arc::clone(&state)), body).await.unwrap();

        assert!(token.is_cancelled());
        assert!(state.readers.lock().await.is_empty());
        let library = state.library.lock().await;
        assert_eq!(library.books().len(), 1);
        assert!(library.book(&BookId::from("z")).is_ok());
        assert!(library.history().is_empty());
    }
}

pub mod backup;
pub mod domain;
pub mod error;
pub mod library;
pub mod marks;
pub mod memory;
pub mod page_index;
pub mod ports;
pub mod position;
pub mod search;
pub mod session;
pub mod stats;
pub mod store;
pub mod sync;

pub use domain::{AppSettings, Book, BookId, Chapter, ExtractedBook, NewBook, ReadingSession, Theme, ThemeSettings};
pub use error::{ReaderError, ReaderResult};
pub use library::{Library, LibraryQuery, SortOrder, StatusFilter};
pub use marks::{Annotation, AnnotationStore, Bookmark, BookmarkKey, BookmarkStore};
pub use page_index::PageIndex;
pub use ports::{ContentExtractor, Dataset, LocalStore, PortError, PortResult, RemoteDocument, RemoteStore};
pub use position::{PositionTracker, ProgressChanged};
pub use session::{SessionDraft, SessionRecorder};
pub use store::{LibrarySnapshot, LibraryStore};
pub use sync::{BookConflict, BooksOutcome, HistoryOutcome, Resolution, SyncOutcome, SyncReconciler};

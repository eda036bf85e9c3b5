//! services/api/src/web/protocol.rs
//!
//! Defines the notifications the server pushes to connected clients over the
//! WebSocket, and the sync summaries shared with the REST API.
//!
//! Background work never fails a request; its outcome reaches the client here.

use chrono::{DateTime, Utc};
use reader_core::domain::ReadingSession;
use reader_core::sync::{BookConflict, BooksOutcome, HistoryOutcome};
use serde::Serialize;
use utoipa::ToSchema;

//=========================================================================================
// Sync Summaries
//=========================================================================================

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pushed,
    Pulled,
    Merged,
    Conflicts,
}

/// One book waiting for a keep-local / keep-cloud / merge decision.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSummary {
    pub id: String,
    pub title: String,
    pub local_page: u32,
    pub cloud_page: u32,
    pub local_modified: DateTime<Utc>,
    pub cloud_modified: DateTime<Utc>,
}

impl From<&BookConflict> for ConflictSummary {
    fn from(conflict: &BookConflict) -> Self {
        Self {
            id: conflict.id.to_string(),
            title: conflict.local.title.clone(),
            local_page: conflict.local.current_page,
            cloud_page: conflict.cloud.current_page,
            local_modified: conflict.local.last_modified,
            cloud_modified: conflict.cloud.last_modified,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub books: SyncStatus,
    pub history: SyncStatus,
    pub conflicts: Vec<ConflictSummary>,
}

impl SyncReport {
    pub fn new(books: &BooksOutcome, history: &HistoryOutcome) -> Self {
        let (books, conflicts) = match books {
            BooksOutcome::Pushed => (SyncStatus::Pushed, Vec::new()),
            BooksOutcome::Pulled(_) => (SyncStatus::Pulled, Vec::new()),
            BooksOutcome::Conflicts(list) => (
                SyncStatus::Conflicts,
                list.iter().map(ConflictSummary::from).collect(),
            ),
        };
        let history = match history {
            HistoryOutcome::Pushed => SyncStatus::Pushed,
            HistoryOutcome::Merged(_) => SyncStatus::Merged,
        };
        Self {
            books,
            history,
            conflicts,
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A reading session was appended to the history.
    SessionRecorded { session: ReadingSession },

    /// A sync finished without anything left to decide.
    SyncCompleted { report: SyncReport },

    /// A sync found books that changed on both sides.
    SyncConflicts { conflicts: Vec<ConflictSummary> },

    /// A background write to the local store failed; in-memory state is kept.
    PersistenceFailed { dataset: String, message: String },

    SyncFailed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use reader_core::domain::{Book, BookId, NewBook};
    use chrono::TimeZone;

    #[test]
    fn messages_are_tagged_by_type() {
        let message = ServerMessage::SyncFailed {
            message: "offline".into(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({ "type": "sync_failed", "message": "offline" })
        );
    }

    #[test]
    fn conflict_reports_list_both_pages() {
        let stamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut local = Book::manual(
            NewBook {
                title: "Germinal".into(),
                total_pages: 300,
                ..Default::default()
            },
            stamp,
        )
        .unwrap();
        local.id = BookId::from("g");
        local.current_page = 120;
        let mut cloud = local.clone();
        cloud.current_page = 80;

        let conflict = BookConflict {
            id: local.id.clone(),
            local,
            cloud,
        };
        let report = SyncReport::new(
            &BooksOutcome::Conflicts(vec![conflict]),
            &HistoryOutcome::Pushed,
        );
        assert_eq!(report.books, SyncStatus::Conflicts);
        assert_eq!(report.history, SyncStatus::Pushed);
        assert_eq!(report.conflicts[0].local_page, 120);
        assert_eq!(report.conflicts[0].cloud_page, 80);
        assert_eq!(report.conflicts[0].id, "g");
    }
}

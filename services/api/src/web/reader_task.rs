//! services/api/src/web/reader_task.rs
//!
//! This module contains the background "worker" that flushes reading sessions
//! while a book is open.

use crate::web::state::AppState;
use chrono::Utc;
use reader_core::domain::BookId;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Periodically asks the book's recorder whether a session is due.
///
/// The task ends when its token is cancelled (book closed, server shutting down)
/// or when the book is no longer open.
pub async fn flush_timer(
    app_state: Arc<AppState>,
    book_id: BookId,
    cancellation_token: CancellationToken,
) {
    info!(book_id = %book_id, "Session flush timer started.");
    let mut ticker = interval(app_state.config.session_check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!(book_id = %book_id, "Session flush timer cancelled.");
                return;
            }
            _ = ticker.tick() => {
                let draft = {
                    let mut readers = app_state.readers.lock().await;
                    match readers.get_mut(&book_id) {
                        Some(reader) => reader.recorder.tick(Utc::now()),
                        None => return,
                    }
                };
                if let Some(draft) = draft {
                    app_state.record_session(draft).await;
                }
            }
        }
    }
}

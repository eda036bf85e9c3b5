//! services/api/src/web/rest/backup.rs
//!
//! Whole-library export and import as a single JSON document.

use crate::error::ApiResult;
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use reader_core::backup::{export_json, parse_import};
use reader_core::ports::Dataset;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub books: usize,
    pub sessions: usize,
}

/// Download the whole library as `e-reader-data-YYYY-MM-DD.json`.
#[utoipa::path(
    get,
    path = "/export",
    responses((status = 200, description = "The library as a JSON attachment", content_type = "application/json"))
)]
pub async fn export_library(State(app_state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let body = export_json(&*app_state.library.lock().await, now)?;
    let disposition = format!(
        "attachment; filename=\"e-reader-data-{}.json\"",
        now.format("%Y-%m-%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// Replace the whole library with an exported document.
///
/// Open books are closed first, which stops their flush timers. Their final sessions
/// are still announced but belong to the outgoing history, so the import drops them.
#[utoipa::path(
    post,
    path = "/import",
    request_body(content = String, content_type = "application/json", description = "A document written by /export"),
    responses(
        (status = 200, description = "What was imported", body = ImportSummary),
        (status = 400, description = "Not an export document")
    )
)]
pub async fn import_library(
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<Json<ImportSummary>> {
    let bundle = parse_import(&body)?;
    let summary = ImportSummary {
        books: bundle.books.len(),
        sessions: bundle.reading_history.len(),
    };

    // Closing records the outgoing sessions; `apply_import` then replaces that history.
    app_state.close_all().await;
    app_state.library.lock().await.apply_import(bundle);
    app_state.conflicts.lock().await.clear();
    for dataset in [
        Dataset::Books,
        Dataset::ReadingHistory,
        Dataset::AppSettings,
        Dataset::ThemeSettings,
    ] {
        app_state.persist(dataset);
    }
    info!(books = summary.books, sessions = summary.sessions, "Library imported.");
    Ok(Json(summary))
}

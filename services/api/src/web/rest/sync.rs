//! services/api/src/web/rest/sync.rs

use crate::error::ApiResult;
use crate::web::protocol::{ConflictSummary, SyncReport};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    response::Json,
};
use reader_core::domain::{Book, BookId};
use reader_core::sync::Resolution;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct ResolveRequest {
    /// keepLocal | keepCloud | merge
    #[schema(value_type = String)]
    pub resolution: Resolution,
}

/// Reconcile with the remote store now.
#[utoipa::path(
    post,
    path = "/sync",
    responses(
        (status = 200, description = "What the sync did", body = SyncReport),
        (status = 400, description = "No remote store is configured"),
        (status = 500, description = "The remote store could not be reached")
    )
)]
pub async fn sync_now(State(app_state): State<Arc<AppState>>) -> ApiResult<Json<SyncReport>> {
    Ok(Json(app_state.run_sync().await?))
}

#[utoipa::path(
    get,
    path = "/sync/conflicts",
    responses((status = 200, description = "Books waiting for a decision", body = [ConflictSummary]))
)]
pub async fn list_conflicts(State(app_state): State<Arc<AppState>>) -> Json<Vec<ConflictSummary>> {
    Json(app_state.pending_conflicts().await)
}

#[utoipa::path(
    post,
    path = "/sync/conflicts/{id}",
    request_body = ResolveRequest,
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book after the decision"),
        (status = 404, description = "No pending conflict for this book")
    )
)]
pub async fn resolve_conflict(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Json<Book>> {
    let book = app_state
        .resolve_conflict(&BookId::from(id), request.resolution)
        .await?;
    Ok(Json(book))
}

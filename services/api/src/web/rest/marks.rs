//! services/api/src/web/rest/marks.rs
//!
//! Handlers for bookmarks and annotations.

use crate::error::ApiResult;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use reader_core::domain::BookId;
use reader_core::marks::{Annotation, Bookmark, BookmarkKey};
use reader_core::page_index::PageIndex;
use reader_core::ports::Dataset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Length of the snippet taken from the chapter text when toggling a bookmark.
const SNIPPET_CHARS: usize = 50;

#[derive(Serialize)]
pub struct BookmarkEntry {
    pub key: BookmarkKey,
    /// The page the bookmark is listed under.
    pub page: u32,
    pub bookmark: Bookmark,
}

#[derive(Serialize, ToSchema)]
pub struct RemovedResponse {
    pub removed: bool,
}

/// Every field is optional; `{}` toggles the bookmark at the reader's position.
#[derive(Deserialize, ToSchema)]
pub struct ToggleRequest {
    /// Defaults to the current chapter.
    pub chapter: Option<usize>,
    /// Defaults to the saved scroll offset of the chapter.
    pub offset: Option<f64>,
    /// Defaults to the opening words of the chapter.
    pub text: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ToggleResponse {
    /// True if a bookmark was added, false if one was removed.
    pub added: bool,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnnotationQuery {
    /// Only annotations on this page.
    pub page: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnotation {
    /// Defaults to the current page.
    pub page: Option<u32>,
    #[serde(default)]
    pub highlighted_text: String,
    #[serde(default)]
    pub note_text: String,
}

#[derive(Serialize, ToSchema)]
pub struct CreatedAnnotation {
    pub id: Uuid,
}

//=========================================================================================
// Bookmarks
//=========================================================================================

/// List bookmarks ordered by page.
#[utoipa::path(
    get,
    path = "/books/{id}/bookmarks",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The bookmarks in page order"),
        (status = 404, description = "No such book")
    )
)]
pub async fn list_bookmarks(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<BookmarkEntry>>> {
    let book = app_state.book(&BookId::from(id)).await?;
    let index = PageIndex::for_book(&book);
    let entries = book
        .bookmarks
        .list(&index)
        .into_iter()
        .map(|(key, bookmark)| BookmarkEntry {
            key,
            page: bookmark.display_page(&index),
            bookmark: bookmark.clone(),
        })
        .collect();
    Ok(Json(entries))
}

/// Add a bookmark, either a bare page number or a chapter position.
#[utoipa::path(
    post,
    path = "/books/{id}/bookmarks",
    request_body(content_type = "application/json", description = "A page number, or a chapterIndex / scrollPosition / text object."),
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 201, description = "The key of the new bookmark"),
        (status = 404, description = "No such book")
    )
)]
pub async fn add_bookmark(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(bookmark): Json<Bookmark>,
) -> ApiResult<(StatusCode, Json<BookmarkKey>)> {
    let id = BookId::from(id);
    let key = app_state
        .mutate(Dataset::Books, |library| {
            library.add_bookmark(&id, bookmark, Utc::now())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(key)))
}

async fn remove_bookmark(
    app_state: &Arc<AppState>,
    id: String,
    key: BookmarkKey,
) -> ApiResult<Json<RemovedResponse>> {
    let id = BookId::from(id);
    let removed = app_state
        .mutate(Dataset::Books, |library| {
            library.remove_bookmark(&id, key, Utc::now())
        })
        .await?;
    Ok(Json(RemovedResponse { removed }))
}

/// Remove a page-number bookmark.
#[utoipa::path(
    delete,
    path = "/books/{id}/bookmarks/page/{page}",
    params(
        ("id" = String, Path, description = "Book id"),
        ("page" = u32, Path, description = "Bookmarked page")
    ),
    responses((status = 200, description = "Whether a bookmark was removed", body = RemovedResponse))
)]
pub async fn remove_page_bookmark(
    State(app_state): State<Arc<AppState>>,
    Path((id, page)): Path<(String, u32)>,
) -> ApiResult<Json<RemovedResponse>> {
    remove_bookmark(&app_state, id, BookmarkKey::Page(page)).await
}

/// Remove a chapter-position bookmark by its index in the list.
#[utoipa::path(
    delete,
    path = "/books/{id}/bookmarks/index/{index}",
    params(
        ("id" = String, Path, description = "Book id"),
        ("index" = usize, Path, description = "Bookmark index")
    ),
    responses((status = 200, description = "Whether a bookmark was removed", body = RemovedResponse))
)]
pub async fn remove_indexed_bookmark(
    State(app_state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Json<RemovedResponse>> {
    remove_bookmark(&app_state, id, BookmarkKey::Index(index)).await
}

/// Add or remove the bookmark at a chapter position.
#[utoipa::path(
    post,
    path = "/books/{id}/bookmarks/toggle",
    request_body = ToggleRequest,
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "Whether the bookmark was added", body = ToggleResponse),
        (status = 404, description = "No such book")
    )
)]
pub async fn toggle_bookmark(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Json<ToggleResponse>> {
    let id = BookId::from(id);
    let position = app_state.position(&id).await?;

    let chapter = request.chapter.unwrap_or(position.chapter);
    let offset = request.offset.unwrap_or(position.scroll_offset);
    let text = match request.text {
        Some(text) => text,
        None => {
            let book = app_state.book(&id).await?;
            book.chapters
                .get(chapter)
                .and_then(|c| c.content.as_deref())
                .map(|content| content.trim().chars().take(SNIPPET_CHARS).collect())
                .unwrap_or_default()
        }
    };

    let added = app_state
        .mutate(Dataset::Books, |library| {
            library.toggle_bookmark(&id, chapter, offset, &text, Utc::now())
        })
        .await?;
    Ok(Json(ToggleResponse { added }))
}

//=========================================================================================
// Annotations
//=========================================================================================

#[utoipa::path(
    get,
    path = "/books/{id}/annotations",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The annotations"),
        (status = 404, description = "No such book")
    )
)]
pub async fn list_annotations(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<AnnotationQuery>,
) -> ApiResult<Json<Vec<Annotation>>> {
    let book = app_state.book(&BookId::from(id)).await?;
    let annotations = match query.page {
        Some(page) => book.annotations.on_page(page).cloned().collect(),
        None => book.annotations.list().into_iter().cloned().collect(),
    };
    Ok(Json(annotations))
}

#[utoipa::path(
    post,
    path = "/books/{id}/annotations",
    request_body = NewAnnotation,
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 201, description = "Annotation created", body = CreatedAnnotation),
        (status = 400, description = "Page outside the book"),
        (status = 404, description = "No such book")
    )
)]
pub async fn add_annotation(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(entry): Json<NewAnnotation>,
) -> ApiResult<(StatusCode, Json<CreatedAnnotation>)> {
    let id = BookId::from(id);
    let page = match entry.page {
        Some(page) => page,
        None => app_state.position(&id).await?.page,
    };
    let annotation_id = app_state
        .mutate(Dataset::Books, |library| {
            library.add_annotation(
                &id,
                page,
                &entry.highlighted_text,
                &entry.note_text,
                Utc::now(),
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedAnnotation { id: annotation_id })))
}

#[utoipa::path(
    delete,
    path = "/books/{id}/annotations/{annotation_id}",
    params(
        ("id" = String, Path, description = "Book id"),
        ("annotation_id" = Uuid, Path, description = "Annotation id")
    ),
    responses((status = 200, description = "Whether an annotation was removed", body = RemovedResponse))
)]
pub async fn remove_annotation(
    State(app_state): State<Arc<AppState>>,
    Path((id, annotation_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<RemovedResponse>> {
    let id = BookId::from(id);
    let removed = app_state
        .mutate(Dataset::Books, |library| {
            library.remove_annotation(&id, annotation_id, Utc::now())
        })
        .await?;
    Ok(Json(RemovedResponse { removed }))
}

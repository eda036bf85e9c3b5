//! services/api/src/web/rest/reading.rs
//!
//! Handlers for an open book: opening and closing it, navigation, page content,
//! in-book search and reading statistics.

use crate::error::ApiResult;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use reader_core::domain::{BookId, ReadingSession};
use reader_core::page_index::PageIndex;
use reader_core::position::ProgressChanged;
use reader_core::search::{search, SearchHit};
use reader_core::stats::{streak_days, summarize, BookStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct PageRequest {
    pub page: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct ChapterRequest {
    pub chapter: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct ScrollRequest {
    pub offset: f64,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContentQuery {
    /// Page number; defaults to the current page.
    pub page: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// At least two characters.
    #[serde(default)]
    pub q: String,
}

/// What the reader shows for one page.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub page: u32,
    pub chapter_index: usize,
    pub chapter_title: Option<String>,
    pub content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: BookStats,
    /// Consecutive reading days of this book, ending today or yesterday.
    pub streak_days: u32,
}

//=========================================================================================
// Opening and Closing
//=========================================================================================

/// Open a book and start recording a reading session.
#[utoipa::path(
    post,
    path = "/books/{id}/open",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The position the book opened at"),
        (status = 404, description = "No such book")
    )
)]
pub async fn open_book(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProgressChanged>> {
    Ok(Json(app_state.open_book(&BookId::from(id)).await?))
}

/// Close a book. Returns the final reading session, if any pages were read.
#[utoipa::path(
    post,
    path = "/books/{id}/close",
    params(("id" = String, Path, description = "Book id")),
    responses((status = 200, description = "The final session, or null"))
)]
pub async fn close_book(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Option<ReadingSession>>> {
    Ok(Json(app_state.close_book(&BookId::from(id)).await?))
}

//=========================================================================================
// Navigation
//=========================================================================================

#[utoipa::path(
    get,
    path = "/books/{id}/position",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The current position"),
        (status = 404, description = "No such book")
    )
)]
pub async fn get_position(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProgressChanged>> {
    Ok(Json(app_state.position(&BookId::from(id)).await?))
}

/// Go to a page. Pages outside the book leave the position unchanged.
#[utoipa::path(
    post,
    path = "/books/{id}/page",
    request_body = PageRequest,
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The position after the move"),
        (status = 400, description = "The book is not open"),
        (status = 404, description = "No such book")
    )
)]
pub async fn goto_page(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PageRequest>,
) -> ApiResult<Json<ProgressChanged>> {
    let progress = app_state
        .navigate(&BookId::from(id), |tracker| tracker.goto_page(request.page))
        .await?;
    Ok(Json(progress))
}

/// Go to the start of a chapter, restoring its saved scroll offset.
#[utoipa::path(
    post,
    path = "/books/{id}/chapter",
    request_body = ChapterRequest,
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The position after the move"),
        (status = 400, description = "The book is not open")
    )
)]
pub async fn goto_chapter(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ChapterRequest>,
) -> ApiResult<Json<ProgressChanged>> {
    let progress = app_state
        .navigate(&BookId::from(id), |tracker| tracker.goto_chapter(request.chapter))
        .await?;
    Ok(Json(progress))
}

#[utoipa::path(
    post,
    path = "/books/{id}/chapter/next",
    params(("id" = String, Path, description = "Book id")),
    responses((status = 200, description = "The position after the move"))
)]
pub async fn next_chapter(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProgressChanged>> {
    let progress = app_state
        .navigate(&BookId::from(id), |tracker| tracker.next_chapter())
        .await?;
    Ok(Json(progress))
}

#[utoipa::path(
    post,
    path = "/books/{id}/chapter/prev",
    params(("id" = String, Path, description = "Book id")),
    responses((status = 200, description = "The position after the move"))
)]
pub async fn prev_chapter(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProgressChanged>> {
    let progress = app_state
        .navigate(&BookId::from(id), |tracker| tracker.prev_chapter())
        .await?;
    Ok(Json(progress))
}

/// Save the scroll offset within the current chapter.
#[utoipa::path(
    post,
    path = "/books/{id}/scroll",
    request_body = ScrollRequest,
    params(("id" = String, Path, description = "Book id")),
    responses((status = 200, description = "The position with the saved offset"))
)]
pub async fn record_scroll(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ScrollRequest>,
) -> ApiResult<Json<ProgressChanged>> {
    let progress = app_state
        .navigate(&BookId::from(id), |tracker| {
            tracker.record_scroll(request.offset);
            Some(tracker.progress())
        })
        .await?;
    Ok(Json(progress))
}

//=========================================================================================
// Content, Search and Statistics
//=========================================================================================

/// The content shown for a page; defaults to the current page.
#[utoipa::path(
    get,
    path = "/books/{id}/content",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The page content", body = PageContent),
        (status = 404, description = "No such book")
    )
)]
pub async fn page_content(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ContentQuery>,
) -> ApiResult<Json<PageContent>> {
    let id = BookId::from(id);
    let current = app_state.position(&id).await?.page;
    let book = app_state.book(&id).await?;

    let page = query.page.unwrap_or(current).clamp(1, book.total_pages.max(1));
    let index = PageIndex::for_book(&book);
    let chapter_index = index.chapter_for_page(page);
    Ok(Json(PageContent {
        page,
        chapter_index,
        chapter_title: book.chapters.get(chapter_index).map(|c| c.title.clone()),
        content: index.content_for_page(page).into_owned(),
    }))
}

/// Search the book's text. Hits nearest the current page come first.
#[utoipa::path(
    get,
    path = "/books/{id}/search",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The hits"),
        (status = 404, description = "No such book")
    )
)]
pub async fn search_book(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    let id = BookId::from(id);
    let current = app_state.position(&id).await?.page;
    let book = app_state.book(&id).await?;
    Ok(Json(search(&PageIndex::for_book(&book), &query.q, current)))
}

#[utoipa::path(
    get,
    path = "/books/{id}/stats",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "Reading statistics for the book"),
        (status = 404, description = "No such book")
    )
)]
pub async fn book_stats(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatsResponse>> {
    let id = BookId::from(id);
    let library = app_state.library.lock().await;
    let book = library.book(&id)?;
    let sessions: Vec<ReadingSession> = library.history_for(&id).into_iter().cloned().collect();

    Ok(Json(StatsResponse {
        stats: summarize(book, &sessions),
        streak_days: streak_days(&sessions, Utc::now().date_naive()),
    }))
}

//! services/api/src/web/rest/books.rs
//!
//! Handlers for the library view: listing, adding, importing and deleting books.

use crate::adapters::extractor::title_and_author;
use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use reader_core::domain::{Book, BookId, ExtractedBook, NewBook};
use reader_core::library::{LibraryQuery, SortOrder, StatusFilter};
use reader_core::ports::Dataset;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::IntoParams;

#[derive(Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct ListBooksQuery {
    /// Matches title or author, case-insensitive.
    pub search: Option<String>,
    /// all | reading | completed | notStarted
    #[param(value_type = Option<String>)]
    pub status: StatusFilter,
    /// title | author | recent | progress
    #[param(value_type = Option<String>)]
    pub sort: SortOrder,
}

impl From<ListBooksQuery> for LibraryQuery {
    fn from(query: ListBooksQuery) -> Self {
        Self {
            search: query.search,
            status: query.status,
            sort: query.sort,
        }
    }
}

/// List the library, optionally searched, filtered and sorted.
#[utoipa::path(
    get,
    path = "/books",
    responses(
        (status = 200, description = "The matching books"),
        (status = 400, description = "Unknown status or sort value")
    )
)]
pub async fn list_books(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListBooksQuery>,
) -> ApiResult<Json<Vec<Book>>> {
    let query = LibraryQuery::from(query);
    let library = app_state.library.lock().await;
    Ok(Json(library.query(&query).into_iter().cloned().collect()))
}

/// Add a book from the manual entry form.
#[utoipa::path(
    post,
    path = "/books",
    request_body(content_type = "application/json", description = "Title, author, cover, total pages and optional chapters."),
    responses(
        (status = 201, description = "Book created"),
        (status = 400, description = "Missing title or page count")
    )
)]
pub async fn create_book(
    State(app_state): State<Arc<AppState>>,
    Json(entry): Json<NewBook>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let book = Book::manual(entry, Utc::now())?;
    let book = app_state
        .mutate(Dataset::Books, |library| Ok(library.add_book(book).clone()))
        .await?;
    info!(book_id = %book.id, title = %book.title, "Book added manually.");
    Ok((StatusCode::CREATED, Json(book)))
}

/// Import a book from an uploaded file.
///
/// Accepts a multipart/form-data request with a single file part. Files that
/// cannot be read still produce a one-chapter placeholder book.
#[utoipa::path(
    post,
    path = "/books/import",
    request_body(content_type = "multipart/form-data", description = "The book file to import."),
    responses(
        (status = 201, description = "Book imported"),
        (status = 400, description = "Bad request (e.g., missing file)")
    )
)]
pub async fn import_book(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
        .ok_or_else(|| ApiError::BadRequest("Multipart form must include a file".to_string()))?;
    let file_name = field.file_name().unwrap_or("untitled.txt").to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read file bytes: {}", e)))?;

    let extracted = match app_state.extractor.extract(&file_name, &data).await {
        Ok(extracted) => extracted,
        Err(e) => {
            warn!(file_name = %file_name, "Extraction failed, importing a stand-in book: {}", e);
            let (title, author) = title_and_author(&file_name);
            ExtractedBook::stand_in(title, author)
        }
    };
    let book = Book::from_extracted(extracted, Utc::now());
    let book = app_state
        .mutate(Dataset::Books, |library| Ok(library.add_book(book).clone()))
        .await?;
    info!(book_id = %book.id, pages = book.total_pages, "Book imported from {}.", file_name);
    Ok((StatusCode::CREATED, Json(book)))
}

#[utoipa::path(
    get,
    path = "/books/{id}",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book"),
        (status = 404, description = "No such book")
    )
)]
pub async fn get_book(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Book>> {
    Ok(Json(app_state.book(&BookId::from(id)).await?))
}

/// Delete a book. An open book is closed first, so its last session is kept.
#[utoipa::path(
    delete,
    path = "/books/{id}",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "No such book")
    )
)]
pub async fn delete_book(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = BookId::from(id);
    app_state.close_book(&id).await?;
    app_state
        .mutate(Dataset::Books, |library| library.remove_book(&id))
        .await?;
    info!(book_id = %id, "Book deleted.");
    Ok(StatusCode::NO_CONTENT)
}

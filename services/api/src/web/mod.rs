pub mod protocol;
pub mod reader_task;
pub mod rest;
pub mod state;
pub mod sync_task;
pub mod ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use rest::{backup, books, marks, reading, settings, sync};
use state::AppState;
use std::sync::Arc;

pub use ws_handler::ws_handler;

/// Largest accepted upload, for book imports and library restores.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Builds the API router. Layers that depend on deployment (CORS, docs) are
/// added by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    let book_routes = Router::new()
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/import", post(books::import_book))
        .route("/books/{id}", get(books::get_book).delete(books::delete_book));

    let reading_routes = Router::new()
        .route("/books/{id}/open", post(reading::open_book))
        .route("/books/{id}/close", post(reading::close_book))
        .route("/books/{id}/position", get(reading::get_position))
        .route("/books/{id}/page", post(reading::goto_page))
        .route("/books/{id}/chapter", post(reading::goto_chapter))
        .route("/books/{id}/chapter/next", post(reading::next_chapter))
        .route("/books/{id}/chapter/prev", post(reading::prev_chapter))
        .route("/books/{id}/scroll", post(reading::record_scroll))
        .route("/books/{id}/content", get(reading::page_content))
        .route("/books/{id}/search", get(reading::search_book))
        .route("/books/{id}/stats", get(reading::book_stats));

    let mark_routes = Router::new()
        .route(
            "/books/{id}/bookmarks",
            get(marks::list_bookmarks).post(marks::add_bookmark),
        )
        .route(
            "/books/{id}/bookmarks/page/{page}",
            delete(marks::remove_page_bookmark),
        )
        .route(
            "/books/{id}/bookmarks/index/{index}",
            delete(marks::remove_indexed_bookmark),
        )
        .route("/books/{id}/bookmarks/toggle", post(marks::toggle_bookmark))
        .route(
            "/books/{id}/annotations",
            get(marks::list_annotations).post(marks::add_annotation),
        )
        .route(
            "/books/{id}/annotations/{annotation_id}",
            delete(marks::remove_annotation),
        );

    let settings_routes = Router::new()
        .route(
            "/settings/app",
            get(settings::get_app_settings).put(settings::put_app_settings),
        )
        .route(
            "/settings/theme",
            get(settings::get_theme_settings).put(settings::put_theme_settings),
        )
        .route("/settings/theme/active", get(settings::active_theme));

    let data_routes = Router::new()
        .route("/export", get(backup::export_library))
        .route("/import", post(backup::import_library))
        .route("/sync", post(sync::sync_now))
        .route("/sync/conflicts", get(sync::list_conflicts))
        .route("/sync/conflicts/{id}", post(sync::resolve_conflict))
        .route("/ws", get(ws_handler));

    Router::new()
        .merge(book_routes)
        .merge(reading_routes)
        .merge(mark_routes)
        .merge(settings_routes)
        .merge(data_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}

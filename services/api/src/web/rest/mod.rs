//! services/api/src/web/rest/mod.rs
//!
//! The REST API, grouped by what the client is looking at.

pub mod backup;
pub mod books;
pub mod marks;
pub mod reading;
pub mod settings;
pub mod sync;

use crate::web::protocol::{ConflictSummary, SyncReport, SyncStatus};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        books::list_books,
        books::create_book,
        books::import_book,
        books::get_book,
        books::delete_book,
        reading::open_book,
        reading::close_book,
        reading::get_position,
        reading::goto_page,
        reading::goto_chapter,
        reading::next_chapter,
        reading::prev_chapter,
        reading::record_scroll,
        reading::page_content,
        reading::search_book,
        reading::book_stats,
        marks::list_bookmarks,
        marks::add_bookmark,
        marks::remove_page_bookmark,
        marks::remove_indexed_bookmark,
        marks::toggle_bookmark,
        marks::list_annotations,
        marks::add_annotation,
        marks::remove_annotation,
        settings::get_app_settings,
        settings::put_app_settings,
        settings::get_theme_settings,
        settings::put_theme_settings,
        settings::active_theme,
        backup::export_library,
        backup::import_library,
        sync::sync_now,
        sync::list_conflicts,
        sync::resolve_conflict,
    ),
    components(
        schemas(
            reading::PageRequest,
            reading::ChapterRequest,
            reading::ScrollRequest,
            reading::PageContent,
            marks::RemovedResponse,
            marks::ToggleRequest,
            marks::ToggleResponse,
            marks::NewAnnotation,
            marks::CreatedAnnotation,
            settings::ActiveTheme,
            backup::ImportSummary,
            sync::ResolveRequest,
            SyncReport,
            SyncStatus,
            ConflictSummary,
        )
    ),
    tags(
        (name = "E-Reader API", description = "Library, reading position, marks, settings and sync.")
    )
)]
pub struct ApiDoc;

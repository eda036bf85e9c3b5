//! services/api/src/web/rest/settings.rs

use crate::error::ApiResult;
use crate::web::state::AppState;
use axum::{extract::State, response::Json};
use chrono::Local;
use reader_core::domain::{AppSettings, Theme, ThemeSettings};
use reader_core::ports::Dataset;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct ActiveTheme {
    #[schema(value_type = String)]
    pub theme: Theme,
}

#[utoipa::path(
    get,
    path = "/settings/app",
    responses((status = 200, description = "The reader settings"))
)]
pub async fn get_app_settings(State(app_state): State<Arc<AppState>>) -> Json<AppSettings> {
    Json(app_state.library.lock().await.app_settings.clone())
}

/// Replace the reader settings. Out-of-range values are clamped.
#[utoipa::path(
    put,
    path = "/settings/app",
    request_body(content_type = "application/json", description = "The full reader settings."),
    responses((status = 200, description = "The settings as stored"))
)]
pub async fn put_app_settings(
    State(app_state): State<Arc<AppState>>,
    Json(settings): Json<AppSettings>,
) -> ApiResult<Json<AppSettings>> {
    let settings = app_state
        .mutate(Dataset::AppSettings, |library| {
            library.app_settings = settings.normalized();
            Ok(library.app_settings.clone())
        })
        .await?;
    Ok(Json(settings))
}

#[utoipa::path(
    get,
    path = "/settings/theme",
    responses((status = 200, description = "The theme settings"))
)]
pub async fn get_theme_settings(State(app_state): State<Arc<AppState>>) -> Json<ThemeSettings> {
    Json(app_state.library.lock().await.theme_settings.clone())
}

#[utoipa::path(
    put,
    path = "/settings/theme",
    request_body(content_type = "application/json", description = "The full theme settings."),
    responses((status = 200, description = "The theme settings as stored"))
)]
pub async fn put_theme_settings(
    State(app_state): State<Arc<AppState>>,
    Json(settings): Json<ThemeSettings>,
) -> ApiResult<Json<ThemeSettings>> {
    let settings = app_state
        .mutate(Dataset::ThemeSettings, |library| {
            library.theme_settings = settings;
            Ok(library.theme_settings.clone())
        })
        .await?;
    Ok(Json(settings))
}

/// The theme to show right now, taking the night window into account.
#[utoipa::path(
    get,
    path = "/settings/theme/active",
    responses((status = 200, description = "The active theme", body = ActiveTheme))
)]
pub async fn active_theme(State(app_state): State<Arc<AppState>>) -> Json<ActiveTheme> {
    let library = app_state.library.lock().await;
    Json(ActiveTheme {
        theme: library.theme_settings.theme_at(Local::now().time()),
    })
}

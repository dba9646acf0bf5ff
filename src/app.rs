use crate::assets;
use crate::config;
use crate::raster::RasterRenderer;
use crate::state;
use crate::typeset::MathmlTypesetter;

use axum::Router;
use axum::routing::get;
use axum::routing::post;

mod api;
mod editor;
mod export;

pub fn app(config: config::AppConfig) -> Router {
    let renderer = RasterRenderer::new(MathmlTypesetter);
    router(state::AppState::new(config, renderer))
}

pub(crate) fn router(state: state::AppState) -> Router {
    Router::new()
        .route("/", get(editor::editor_page))
        .route("/formula", post(editor::formula_replace))
        .route("/insert", post(editor::formula_insert))
        .route("/undo", post(editor::formula_undo))
        .route("/clear", post(editor::formula_clear))
        .route("/wrap", post(editor::formula_wrap))
        .route("/style", post(editor::style_update))
        .route("/export/{filename}", get(export::export_download))
        .route("/api/render", post(api::render))
        .route("/static/style.css", get(assets::stylesheet))
        .route("/static/app.js", get(assets::app_script))
        .route("/health", get(health))
        .with_state(state)
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

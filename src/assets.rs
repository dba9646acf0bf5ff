use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;

pub(crate) async fn stylesheet() -> impl IntoResponse {
    const CSS_CONTENT: &str = include_str!("../static/style.css");
    (
        [
            (CONTENT_TYPE, "text/css"),
            (CACHE_CONTROL, "public, max-age=3600"),
        ],
        CSS_CONTENT,
    )
}

pub(crate) async fn app_script() -> impl IntoResponse {
    const APP_JS_CONTENT: &str = include_str!("../static/app.js");
    (
        [
            (CONTENT_TYPE, "application/javascript"),
            (CACHE_CONTROL, "public, max-age=3600"),
        ],
        APP_JS_CONTENT,
    )
}

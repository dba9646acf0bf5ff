use crate::session::session_id_from_headers;
use crate::state;

use axum::extract::Path as AxumPath;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

/// Serves the session's last raster image as an attachment. The requested
/// name must match the image's format.
pub(crate) async fn export_download(
    State(state): State<state::AppState>,
    headers: HeaderMap,
    AxumPath(filename): AxumPath<String>,
) -> Response {
    let image = state
        .sessions
        .read(session_id_from_headers(&headers), |session| {
            session.editor.last_image().cloned()
        })
        .flatten();

    let Some(image) = image.filter(|image| image.filename() == filename) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    (
        [
            (CONTENT_TYPE, image.mime_type().to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", image.filename()),
            ),
            (CACHE_CONTROL, "no-store".to_string()),
        ],
        image.bytes,
    )
        .into_response()
}

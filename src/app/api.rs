use crate::classify::needs_advanced;
use crate::editor::collapse_double_backslashes;
use crate::error::RenderError;
use crate::state;
use crate::style::{Color, OutputFormat, RenderStyle};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct RenderRequest {
    tex: String,
    #[serde(default = "default_format")]
    format: String,
    #[serde(default)]
    style: StyleOverrides,
}

fn default_format() -> String {
    OutputFormat::Png.as_str().to_string()
}

/// Partial style; unset fields keep the server defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StyleOverrides {
    font_size: Option<u32>,
    dpi: Option<u32>,
    padding_px: Option<u32>,
    text_color: Option<Color>,
    background: Option<Color>,
    transparent: Option<bool>,
}

impl StyleOverrides {
    fn apply_to(self, mut style: RenderStyle) -> RenderStyle {
        if let Some(font_size) = self.font_size {
            style.font_size = font_size;
        }
        if let Some(dpi) = self.dpi {
            style.dpi = dpi;
        }
        if let Some(padding_px) = self.padding_px {
            style.padding_px = padding_px;
        }
        if let Some(text_color) = self.text_color {
            style.text_color = text_color;
        }
        if let Some(background) = self.background {
            style.background = background;
        }
        if let Some(transparent) = self.transparent {
            style.transparent = transparent;
        }
        style
    }
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error: String,
}

fn api_error(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ApiErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Stateless raster render. Formulas that need the browser typesetter are
/// refused since there is no browser on this path.
pub(crate) async fn render(
    State(state): State<state::AppState>,
    Json(request): Json<RenderRequest>,
) -> Response {
    let format: OutputFormat = match request.format.parse() {
        Ok(format) => format,
        Err(_) => {
            let err = RenderError::InvalidFormat(request.format.trim().to_string());
            return api_error(StatusCode::BAD_REQUEST, err);
        }
    };

    let style = request.style.apply_to(state.config.style.clone());
    if let Err(err) = style.validate() {
        return api_error(StatusCode::UNPROCESSABLE_ENTITY, err);
    }

    if needs_advanced(&request.tex) {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "formula needs the advanced renderer",
        );
    }

    let tex = collapse_double_backslashes(&request.tex);
    let renderer = state.renderer.clone();
    let rendered =
        tokio::task::spawn_blocking(move || renderer.render_as(&tex, format, &style)).await;
    let rendered = match rendered {
        Ok(rendered) => rendered,
        Err(err) => {
            tracing::error!(error = %err, "render task failed");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "render task failed");
        }
    };

    match rendered {
        Ok(image) => (
            [
                (CONTENT_TYPE, image.mime_type()),
                (CACHE_CONTROL, "no-store"),
            ],
            image.bytes,
        )
            .into_response(),
        Err(err) => {
            tracing::debug!(error = %err, "api render failed");
            api_error(StatusCode::UNPROCESSABLE_ENTITY, err)
        }
    }
}

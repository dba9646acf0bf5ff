use crate::editor::Preview;
use crate::export::ExportCta;
use crate::interactive;
use crate::math::{MathStyle, render_mathml};
use crate::palette;
use crate::session::{Session, SessionAccess, session_cookie, session_id_from_headers};
use crate::state;
use crate::style::{DPI_RANGE, FONT_SIZE_RANGE, OutputFormat, PADDING_RANGE, StyleUpdate};
use crate::templates;

use axum::extract::Form;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

pub(crate) async fn editor_page(
    State(state): State<state::AppState>,
    headers: HeaderMap,
) -> Response {
    let rendered = with_session_blocking(&state, &headers, |state, session| {
        render_page(state, session, String::new())
    })
    .await;
    match rendered {
        Ok(access) => with_session_cookie(&state, &access.id, access.value),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FormulaForm {
    formula: String,
}

pub(crate) async fn formula_replace(
    State(state): State<state::AppState>,
    headers: HeaderMap,
    Form(form): Form<FormulaForm>,
) -> Response {
    mutate(&state, &headers, |session| session.editor.replace(form.formula))
}

#[derive(Debug, Deserialize)]
pub(crate) struct InsertForm {
    token: String,
}

pub(crate) async fn formula_insert(
    State(state): State<state::AppState>,
    headers: HeaderMap,
    Form(form): Form<InsertForm>,
) -> Response {
    let Some(token) = palette::lookup(&form.token) else {
        tracing::warn!(token = %form.token, "unknown palette token");
        let rendered = with_session_blocking(&state, &headers, |state, session| {
            render_page(state, session, "Unknown palette token.".to_string())
        })
        .await;
        return match rendered {
            Ok(access) => with_session_cookie(
                &state,
                &access.id,
                (StatusCode::BAD_REQUEST, access.value),
            ),
            Err(response) => response,
        };
    };
    mutate(&state, &headers, |session| {
        session.editor.insert(token.tex, token.needs_advanced)
    })
}

pub(crate) async fn formula_undo(
    State(state): State<state::AppState>,
    headers: HeaderMap,
) -> Response {
    mutate(&state, &headers, |session| {
        session.editor.undo();
    })
}

pub(crate) async fn formula_clear(
    State(state): State<state::AppState>,
    headers: HeaderMap,
) -> Response {
    mutate(&state, &headers, |session| session.editor.clear())
}

pub(crate) async fn formula_wrap(
    State(state): State<state::AppState>,
    headers: HeaderMap,
) -> Response {
    mutate(&state, &headers, |session| session.editor.wrap())
}

#[derive(Debug, Deserialize)]
pub(crate) struct StyleForm {
    font_size: u32,
    dpi: u32,
    padding_px: u32,
    format: String,
    text_color: String,
    background: Option<String>,
    /// Checkbox; present only when ticked.
    transparent: Option<String>,
}

pub(crate) async fn style_update(
    State(state): State<state::AppState>,
    headers: HeaderMap,
    Form(form): Form<StyleForm>,
) -> Response {
    let update = StyleUpdate {
        font_size: form.font_size,
        dpi: form.dpi,
        padding_px: form.padding_px,
        text_color: form.text_color,
        background: form.background,
        transparent: form.transparent.is_some(),
    };
    let applied = with_session_blocking(&state, &headers, move |state, session| {
        let applied = form
            .format
            .parse::<OutputFormat>()
            .and_then(|format| {
                let mut style = session.style.clone();
                style.apply(&update)?;
                Ok((style, format))
            });
        match applied {
            Ok((style, format)) => {
                session.style = style;
                session.format = format;
                None
            }
            Err(err) => {
                tracing::debug!(error = %err, "rejected style update");
                Some(render_page(state, session, err.to_string()))
            }
        }
    })
    .await;
    let access = match applied {
        Ok(access) => access,
        Err(response) => return response,
    };

    match access.value {
        None => with_session_cookie(&state, &access.id, Redirect::to("/")),
        Some(page) => with_session_cookie(&state, &access.id, (StatusCode::BAD_REQUEST, page)),
    }
}

/// Applies one state transition and redirects back to the editor.
fn mutate(
    state: &state::AppState,
    headers: &HeaderMap,
    transition: impl FnOnce(&mut Session),
) -> Response {
    let access = state
        .sessions
        .with_session(session_id_from_headers(headers), transition);
    with_session_cookie(state, &access.id, Redirect::to("/"))
}

/// Runs `f` against the request's session on the blocking thread pool.
async fn with_session_blocking<R, F>(
    state: &state::AppState,
    headers: &HeaderMap,
    f: F,
) -> Result<SessionAccess<R>, Response>
where
    R: Send + 'static,
    F: FnOnce(&state::AppState, &mut Session) -> R + Send + 'static,
{
    let id = session_id_from_headers(headers).map(str::to_string);
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        state
            .sessions
            .with_session(id.as_deref(), |session| f(&state, session))
    })
    .await
    .map_err(|err| {
        tracing::error!(error = %err, "session task failed");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

pub(super) fn with_session_cookie(
    state: &state::AppState,
    id: &str,
    response: impl IntoResponse,
) -> Response {
    let mut response = response.into_response();
    match HeaderValue::from_str(&session_cookie(id, state.sessions.ttl())) {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Err(err) => tracing::error!(error = %err, "failed to build session cookie"),
    }
    response
}

/// Runs the render cycle for `session` and builds the editor page.
fn render_page(
    state: &state::AppState,
    session: &mut Session,
    error: String,
) -> templates::EditorTemplate {
    let preview = session
        .editor
        .render_cycle(&state.renderer, session.format, &session.style);

    let mut export = None;
    let preview = match preview {
        Preview::Empty => templates::PreviewView::default(),
        Preview::Advanced { tex } => match interactive::render_component(&tex, &session.style) {
            Ok(html) => templates::PreviewView {
                advanced_html: Some(html),
                ..Default::default()
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to render advanced preview");
                templates::PreviewView {
                    hint: Some("The advanced preview could not be prepared.".to_string()),
                    ..Default::default()
                }
            }
        },
        Preview::Raster(image) => {
            let cta = ExportCta::from_image(&image);
            let view = templates::PreviewView {
                image_src: Some(cta.data_url.clone()),
                ..Default::default()
            };
            export = Some(cta);
            view
        }
        Preview::Failed { hint } => templates::PreviewView {
            hint: Some(hint.to_string()),
            ..Default::default()
        },
    };

    templates::EditorTemplate {
        app_name: state.config.app_name.clone(),
        formula: session.editor.formula().to_string(),
        can_undo: session.editor.history_len() > 0,
        preview,
        export,
        palette: palette_sections(),
        settings: settings_view(session),
        error,
    }
}

fn palette_sections() -> Vec<templates::PaletteSection> {
    palette::CATEGORIES
        .iter()
        .enumerate()
        .map(|(position, category)| templates::PaletteSection {
            key: category.key,
            title: category.title,
            open: position == 0,
            tiles: category
                .tokens
                .iter()
                .enumerate()
                .map(|(index, token)| templates::PaletteTile {
                    id: category.token_id(index),
                    tex: token.tex,
                    label_html: render_mathml(token.label, MathStyle::Inline).into_html(),
                })
                .collect(),
        })
        .collect()
}

fn settings_view(session: &Session) -> templates::SettingsView {
    let style = &session.style;
    let (font_size_min, font_size_max) = FONT_SIZE_RANGE;
    let (dpi_min, dpi_max) = DPI_RANGE;
    let (padding_min, padding_max) = PADDING_RANGE;
    templates::SettingsView {
        font_size: style.font_size,
        font_size_min,
        font_size_max,
        png_selected: session.format == OutputFormat::Png,
        dpi: style.dpi,
        dpi_min,
        dpi_max,
        padding_px: style.padding_px,
        padding_min,
        padding_max,
        text_color: style.text_color.to_string(),
        background: style.background.to_string(),
        transparent: style.transparent,
    }
}

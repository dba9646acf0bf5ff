use askama::Template;
use askama_web::WebTemplate;

#[derive(Template, WebTemplate)]
#[template(path = "editor.html")]
pub(crate) struct EditorTemplate {
    pub(crate) app_name: String,
    pub(crate) formula: String,
    pub(crate) can_undo: bool,
    pub(crate) preview: PreviewView,
    pub(crate) export: Option<crate::export::ExportCta>,
    pub(crate) palette: Vec<PaletteSection>,
    pub(crate) settings: SettingsView,
    pub(crate) error: String,
}

/// What the preview pane shows. At most one field is set; none means empty.
#[derive(Default)]
pub(crate) struct PreviewView {
    pub(crate) advanced_html: Option<String>,
    pub(crate) image_src: Option<String>,
    pub(crate) hint: Option<String>,
}

pub(crate) struct PaletteSection {
    pub(crate) key: &'static str,
    pub(crate) title: &'static str,
    pub(crate) open: bool,
    pub(crate) tiles: Vec<PaletteTile>,
}

pub(crate) struct PaletteTile {
    pub(crate) id: String,
    pub(crate) tex: &'static str,
    pub(crate) label_html: String,
}

pub(crate) struct SettingsView {
    pub(crate) font_size: u32,
    pub(crate) font_size_min: u32,
    pub(crate) font_size_max: u32,
    pub(crate) png_selected: bool,
    pub(crate) dpi: u32,
    pub(crate) dpi_min: u32,
    pub(crate) dpi_max: u32,
    pub(crate) padding_px: u32,
    pub(crate) padding_min: u32,
    pub(crate) padding_max: u32,
    pub(crate) text_color: String,
    pub(crate) background: String,
    pub(crate) transparent: bool,
}

/// Browser-side typesetting of a formula that the raster engine cannot draw.
#[derive(Template)]
#[template(path = "mathjax.html")]
pub(crate) struct MathJaxTemplate {
    pub(crate) tex: String,
    pub(crate) font_size_px: u32,
    pub(crate) text_color: String,
    pub(crate) background: String,
    pub(crate) fallback_html: String,
}

mod filters {
    use std::fmt::Write;

    /// Escapes a value for use inside a double-quoted JavaScript string in a
    /// `<script>` block.
    pub fn json_escape(value: &str, _values: &dyn askama::Values) -> askama::Result<String> {
        let mut escaped = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '"' => escaped.push_str("\\\""),
                '\\' => escaped.push_str("\\\\"),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\t' => escaped.push_str("\\t"),
                '\u{08}' => escaped.push_str("\\b"),
                '\u{0C}' => escaped.push_str("\\f"),
                '<' | '>' | '&' | '\u{2028}' | '\u{2029}' => {
                    write!(escaped, "\\u{:04x}", ch as u32)?;
                }
                ch if ch < '\u{20}' => {
                    write!(escaped, "\\u{:04x}", ch as u32)?;
                }
                _ => escaped.push(ch),
            }
        }
        Ok(escaped)
    }
}

//! Per-session formula buffer, undo history and render-path selection.

use crate::classify::needs_advanced;
use crate::raster::{RasterRenderer, RenderedImage};
use crate::style::{OutputFormat, RenderStyle};

/// Formula a fresh session starts with.
pub const DEFAULT_FORMULA: &str = r"\int_0^{\infty} e^{-x^2}\,dx=\frac{\sqrt{\pi}}{2}";

/// Hint shown when the raster engine cannot draw the formula.
pub const RASTER_RETRY_HINT: &str =
    "Could not draw this formula. Try the matrix/equation palette, which uses the advanced renderer.";

/// Outcome of one render cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    /// Nothing to draw.
    Empty,
    /// Handed to the browser typesetter unmodified.
    Advanced { tex: String },
    Raster(RenderedImage),
    Failed { hint: &'static str },
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    formula: String,
    history: Vec<String>,
    force_advanced: bool,
    last_image: Option<RenderedImage>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(DEFAULT_FORMULA)
    }
}

impl EditorSession {
    pub fn new(formula: impl Into<String>) -> Self {
        Self {
            formula: formula.into(),
            history: Vec::new(),
            force_advanced: false,
            last_image: None,
        }
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn force_advanced(&self) -> bool {
        self.force_advanced
    }

    pub fn last_image(&self) -> Option<&RenderedImage> {
        self.last_image.as_ref()
    }

    /// Appends `token`. The previous formula is pushed onto the history and
    /// `force_advanced` stays set until the next render cycle.
    pub fn insert(&mut self, token: &str, force_advanced: bool) {
        self.history.push(self.formula.clone());
        self.formula.push_str(token);
        self.force_advanced |= force_advanced;
    }

    /// Restores the most recent snapshot. Returns false when there was none.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.formula = previous;
                true
            }
            None => false,
        }
    }

    /// Empties the formula. Not recorded in the history.
    pub fn clear(&mut self) {
        self.formula.clear();
    }

    /// Re-wraps the trimmed formula in exactly one `$` on each side. Not
    /// recorded in the history.
    pub fn wrap(&mut self) {
        self.formula = wrap_formula(&self.formula);
    }

    /// Direct text edit. Not recorded in the history.
    pub fn replace(&mut self, text: impl Into<String>) {
        self.formula = text.into();
    }

    /// Whether the current cycle goes to the browser typesetter.
    pub fn uses_advanced(&self) -> bool {
        self.force_advanced || needs_advanced(&self.formula)
    }

    /// Runs one render cycle: chooses the path, renders on the raster path,
    /// caches the image for export and consumes the force flag.
    pub fn render_cycle(
        &mut self,
        renderer: &RasterRenderer,
        format: OutputFormat,
        style: &RenderStyle,
    ) -> Preview {
        let advanced = self.uses_advanced();
        // Consumed whether or not anything gets drawn this cycle.
        self.force_advanced = false;

        if self.formula.trim().is_empty() {
            self.last_image = None;
            return Preview::Empty;
        }

        if advanced {
            self.last_image = None;
            return Preview::Advanced {
                tex: self.formula.clone(),
            };
        }

        let tex = collapse_double_backslashes(&self.formula);
        match renderer.render_as(&tex, format, style) {
            Ok(image) => {
                self.last_image = Some(image.clone());
                Preview::Raster(image)
            }
            Err(err) => {
                tracing::debug!(error = %err, "raster render failed");
                self.last_image = None;
                Preview::Failed {
                    hint: RASTER_RETRY_HINT,
                }
            }
        }
    }
}

pub fn wrap_formula(formula: &str) -> String {
    let trimmed = formula.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("${}$", trimmed.trim_matches('$'))
}

/// Turns every `\\` into `\`. The raster engine reads math-mode escapes
/// singly, while the advanced syntax uses `\\` as a row break.
pub fn collapse_double_backslashes(tex: &str) -> String {
    tex.replace(r"\\", r"\")
}

use crate::error::TypesetError;
use crate::style::Color;

/// Positioned vector output of a typesetter.
///
/// `svg` is a fragment whose origin is the left end of the baseline; glyphs
/// extend `ascent` units above it (negative y) and `descent` units below.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
    pub svg: String,
}

impl Layout {
    pub fn height(&self) -> f32 {
        self.ascent + self.descent
    }
}

/// Math layout engine used by the raster path.
pub trait Typesetter: Send + Sync + 'static {
    /// Lays out math-mode `tex` (without `$` delimiters) at `font_size`
    /// user units per em.
    fn typeset(&self, tex: &str, font_size: f32, color: Color) -> Result<Layout, TypesetError>;
}

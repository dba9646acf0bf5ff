//! Server-side rendering of a formula to a tightly cropped PNG or SVG.
//!
//! The typesetter produces an SVG fragment which is rasterized with `resvg` on
//! a scratch canvas with a generous margin. The bounding box of the
//! non-transparent pixels is the ink; both output formats are the ink plus the
//! requested padding on every side. PNG output is cut from the scratch canvas,
//! SVG output is a document of the same extent with the fragment shifted so
//! its ink starts at the padding.

use crate::error::RenderError;
use crate::ports::{Layout, Typesetter};
use crate::style::{Color, OutputFormat, RenderStyle};

use resvg::tiny_skia;
use resvg::usvg;

use std::fmt::Write;
use std::sync::{Arc, OnceLock};

/// Largest canvas side the renderer will allocate.
pub const MAX_CANVAS_PX: u32 = 16_384;

/// Largest canvas area the renderer will allocate.
pub const MAX_CANVAS_PIXELS: u64 = 64 * 1024 * 1024;

static FONT_DATABASE: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();

fn font_database() -> Arc<usvg::fontdb::Database> {
    let database = FONT_DATABASE.get_or_init(|| {
        let mut database = usvg::fontdb::Database::new();
        database.load_system_fonts();
        tracing::debug!(faces = database.len(), "loaded system fonts");
        Arc::new(database)
    });
    Arc::clone(database)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
}

impl RenderedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Download name offered for this image.
    pub fn filename(&self) -> &'static str {
        match self.format {
            OutputFormat::Png => "latex.png",
            OutputFormat::Svg => "latex.svg",
        }
    }
}

#[derive(Clone)]
pub struct RasterRenderer {
    typesetter: Arc<dyn Typesetter>,
}

impl RasterRenderer {
    pub fn new(typesetter: impl Typesetter) -> Self {
        Self {
            typesetter: Arc::new(typesetter),
        }
    }

    /// Renders `text` in the named `format` (`png` or `svg`). The format is
    /// checked before any layout work happens.
    pub fn render(
        &self,
        text: &str,
        format: &str,
        style: &RenderStyle,
    ) -> Result<RenderedImage, RenderError> {
        let format: OutputFormat = format
            .parse()
            .map_err(|_| RenderError::InvalidFormat(format.trim().to_string()))?;
        self.render_as(text, format, style)
    }

    pub fn render_as(
        &self,
        text: &str,
        format: OutputFormat,
        style: &RenderStyle,
    ) -> Result<RenderedImage, RenderError> {
        let content = math_content(text);
        if content.is_empty() {
            return Err(RenderError::EmptyFormula);
        }
        let bytes = match format {
            OutputFormat::Png => self.render_png(content, style)?,
            OutputFormat::Svg => self.render_svg(content, style)?.into_bytes(),
        };
        Ok(RenderedImage { bytes, format })
    }

    fn render_png(&self, content: &str, style: &RenderStyle) -> Result<Vec<u8>, RenderError> {
        let font_px = style.font_size as f32 * style.dpi as f32 / 72.0;
        let layout = self
            .typesetter
            .typeset(content, font_px, style.text_color)?;
        let scratch = Scratch::rasterize(&layout, font_px)?;
        let ink = scratch.ink;

        let pad = style.padding_px;
        let out_width = ink.width + 2 * pad;
        let out_height = ink.height + 2 * pad;
        check_canvas(out_width, out_height)?;
        let mut out = tiny_skia::Pixmap::new(out_width, out_height).ok_or(
            RenderError::Rasterize {
                width: out_width,
                height: out_height,
            },
        )?;
        if !style.transparent {
            let Color { r, g, b } = style.background;
            out.fill(tiny_skia::Color::from_rgba8(r, g, b, 255));
        }
        out.draw_pixmap(
            pad as i32 - ink.x as i32,
            pad as i32 - ink.y as i32,
            scratch.pixmap.as_ref(),
            &tiny_skia::PixmapPaint::default(),
            tiny_skia::Transform::identity(),
            None,
        );
        out.encode_png()
            .map_err(|err| RenderError::Encode(err.to_string()))
    }

    fn render_svg(&self, content: &str, style: &RenderStyle) -> Result<String, RenderError> {
        let font_size = style.font_size as f32;
        let layout = self
            .typesetter
            .typeset(content, font_size, style.text_color)?;
        let scratch = Scratch::rasterize(&layout, font_size)?;
        let ink = scratch.ink;

        let pad = style.padding_px;
        let width = ink.width + 2 * pad;
        let height = ink.height + 2 * pad;
        check_canvas(width, height)?;
        let x = scratch.margin - ink.x as f32 + pad as f32;
        let baseline = scratch.baseline - ink.y as f32 + pad as f32;
        let background = (!style.transparent).then_some(style.background);
        Ok(svg_document(
            &layout,
            width as f32,
            height as f32,
            x,
            baseline,
            background,
        ))
    }
}

/// A layout rasterized at one pixel per user unit with `margin` free space
/// around its metric box. The fragment origin sits on whole pixels.
struct Scratch {
    pixmap: tiny_skia::Pixmap,
    ink: InkBounds,
    margin: f32,
    baseline: f32,
}

impl Scratch {
    fn rasterize(layout: &Layout, font_size: f32) -> Result<Self, RenderError> {
        let margin = font_size.ceil();
        let baseline = (margin + layout.ascent).ceil();
        let width = canvas_side(layout.width + 2.0 * margin);
        let height = canvas_side(layout.height() + 2.0 * margin);
        check_canvas(width, height)?;

        let svg = svg_document(
            layout,
            width as f32,
            height as f32,
            margin,
            baseline,
            None,
        );
        let options = usvg::Options {
            fontdb: font_database(),
            ..usvg::Options::default()
        };
        let tree =
            usvg::Tree::from_str(&svg, &options).map_err(|err| RenderError::Svg(err.to_string()))?;
        let mut pixmap =
            tiny_skia::Pixmap::new(width, height).ok_or(RenderError::Rasterize { width, height })?;
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        let ink = ink_bounds(&pixmap).ok_or(RenderError::Blank)?;
        Ok(Self {
            pixmap,
            ink,
            margin,
            baseline,
        })
    }
}

/// Math text the layout engine sees: the formula is treated as wrapped in
/// `$…$` (added when missing) and the delimiters are peeled off again.
pub(crate) fn math_content(text: &str) -> &str {
    text.trim().trim_matches('$').trim()
}

fn canvas_side(extent: f32) -> u32 {
    extent.max(1.0).ceil() as u32
}

fn check_canvas(width: u32, height: u32) -> Result<(), RenderError> {
    if width > MAX_CANVAS_PX
        || height > MAX_CANVAS_PX
        || u64::from(width) * u64::from(height) > MAX_CANVAS_PIXELS
    {
        return Err(RenderError::TooLarge {
            width,
            height,
            max_side: MAX_CANVAS_PX,
            max_pixels: MAX_CANVAS_PIXELS,
        });
    }
    Ok(())
}

fn svg_document(
    layout: &Layout,
    width: f32,
    height: f32,
    x: f32,
    baseline: f32,
    background: Option<Color>,
) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.2}" height="{height:.2}" viewBox="0 0 {width:.2} {height:.2}">"#
    );
    if let Some(background) = background {
        let _ = write!(
            svg,
            r#"<rect width="100%" height="100%" fill="{background}"/>"#
        );
    }
    let _ = write!(
        svg,
        r#"<g transform="translate({x:.2},{baseline:.2})">{}</g></svg>"#,
        layout.svg
    );
    svg
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InkBounds {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

fn ink_bounds(pixmap: &tiny_skia::Pixmap) -> Option<InkBounds> {
    let width = pixmap.width();
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    for (index, pixel) in pixmap.pixels().iter().enumerate() {
        if pixel.alpha() == 0 {
            continue;
        }
        let x = index as u32 % width;
        let y = index as u32 / width;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    if min_x == u32::MAX {
        return None;
    }
    Some(InkBounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::classify::needs_advanced;
    use crate::editor::DEFAULT_FORMULA;
    use crate::error::TypesetError;
    use crate::palette::CATEGORIES;
    use crate::typeset::MathmlTypesetter;

    use std::sync::Mutex;

    /// Draws every formula as a solid block one em wide and half an em tall,
    /// so raster assertions do not depend on installed fonts.
    #[derive(Clone)]
    pub(crate) struct BoxTypesetter {
        pub(crate) calls: Arc<Mutex<Vec<String>>>,
        pub(crate) width_em: f32,
    }

    impl Default for BoxTypesetter {
        fn default() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                width_em: 1.0,
            }
        }
    }

    impl BoxTypesetter {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl Typesetter for BoxTypesetter {
        fn typeset(
            &self,
            tex: &str,
            font_size: f32,
            color: Color,
        ) -> Result<Layout, TypesetError> {
            self.calls.lock().expect("calls lock").push(tex.to_string());
            let width = font_size * self.width_em;
            let height = font_size / 2.0;
            Ok(Layout {
                width,
                ascent: height,
                descent: 0.0,
                svg: format!(
                    r#"<rect x="0" y="{:.2}" width="{width:.2}" height="{height:.2}" fill="{color}"/>"#,
                    -height
                ),
            })
        }
    }

    struct BlankTypesetter;

    impl Typesetter for BlankTypesetter {
        fn typeset(&self, _: &str, font_size: f32, _: Color) -> Result<Layout, TypesetError> {
            Ok(Layout {
                width: font_size,
                ascent: font_size,
                descent: 0.0,
                svg: String::new(),
            })
        }
    }

    fn style() -> RenderStyle {
        RenderStyle {
            font_size: 20,
            dpi: 72,
            padding_px: 2,
            transparent: true,
            ..RenderStyle::default()
        }
    }

    fn alpha_at(pixmap: &tiny_skia::Pixmap, x: u32, y: u32) -> u8 {
        pixmap.pixel(x, y).expect("pixel in bounds").alpha()
    }

    #[test]
    fn render__should_crop_png_to_ink_plus_padding() {
        // Given
        let renderer = RasterRenderer::new(BoxTypesetter::default());

        // When
        let image = renderer.render("y=ax+b", "png", &style()).expect("render");

        // Then
        assert_eq!(image.mime_type(), "image/png");
        let pixmap = tiny_skia::Pixmap::decode_png(&image.bytes).expect("decode png");
        assert_eq!((pixmap.width(), pixmap.height()), (24, 14));
        for x in 0..pixmap.width() {
            for y in [0, 1, 12, 13] {
                assert_eq!(alpha_at(&pixmap, x, y), 0, "margin pixel ({x},{y})");
            }
        }
        for y in 0..pixmap.height() {
            for x in [0, 1, 22, 23] {
                assert_eq!(alpha_at(&pixmap, x, y), 0, "margin pixel ({x},{y})");
            }
        }
        assert_eq!(alpha_at(&pixmap, 2, 2), 255);
        assert_eq!(alpha_at(&pixmap, 21, 11), 255);
    }

    #[test]
    fn render__should_fill_background_when_opaque() {
        // Given
        let renderer = RasterRenderer::new(BoxTypesetter::default());
        let style = RenderStyle {
            transparent: false,
            background: "#ff0000".parse().expect("color"),
            ..style()
        };

        // When
        let image = renderer.render("x", "png", &style).expect("render");

        // Then
        let pixmap = tiny_skia::Pixmap::decode_png(&image.bytes).expect("decode png");
        let corner = pixmap.pixel(0, 0).expect("corner");
        assert_eq!(
            (corner.red(), corner.green(), corner.blue(), corner.alpha()),
            (255, 0, 0, 255)
        );
    }

    #[test]
    fn render__should_scale_png_with_dpi() {
        // Given
        let renderer = RasterRenderer::new(BoxTypesetter::default());
        let style = RenderStyle {
            dpi: 144,
            ..style()
        };

        // When
        let image = renderer.render("x", "png", &style).expect("render");

        // Then
        let pixmap = tiny_skia::Pixmap::decode_png(&image.bytes).expect("decode png");
        assert_eq!((pixmap.width(), pixmap.height()), (44, 24));
    }

    #[test]
    fn render__should_reject_unknown_format_before_typesetting() {
        // Given
        let typesetter = BoxTypesetter::default();
        let renderer = RasterRenderer::new(typesetter.clone());

        // When
        let result = renderer.render("y=ax+b", "gif", &style());

        // Then
        assert!(matches!(result, Err(RenderError::InvalidFormat(format)) if format == "gif"));
        assert!(typesetter.calls().is_empty());
    }

    #[test]
    fn render__should_emit_svg_sized_to_ink() {
        // Given
        let renderer = RasterRenderer::new(BoxTypesetter::default());
        let style = RenderStyle {
            transparent: false,
            ..style()
        };

        // When
        let image = renderer.render("y=ax+b", "svg", &style).expect("render");

        // Then
        assert_eq!(image.mime_type(), "image/svg+xml");
        assert_eq!(image.filename(), "latex.svg");
        let svg = String::from_utf8(image.bytes).expect("utf8 svg");
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"width="24.00""#));
        assert!(svg.contains(r#"height="14.00""#));
        assert!(svg.contains(r##"<rect width="100%" height="100%" fill="#ffffff"/>"##));
    }

    #[test]
    fn render__should_omit_svg_background_when_transparent() {
        let renderer = RasterRenderer::new(BoxTypesetter::default());

        let image = renderer.render("x", "svg", &style()).expect("render");

        let svg = String::from_utf8(image.bytes).expect("utf8 svg");
        assert!(!svg.contains(r#"width="100%""#));
    }

    /// Rasterizes an emitted SVG document at its own size and returns the
    /// transparent margins around the ink as (left, top, right, bottom).
    fn svg_margins(svg: &[u8]) -> (u32, u32, u32, u32) {
        let options = usvg::Options {
            fontdb: font_database(),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_data(svg, &options).expect("parse svg");
        let size = tree.size().to_int_size();
        let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).expect("pixmap");
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
        let ink = ink_bounds(&pixmap).expect("svg has ink");
        (
            ink.x,
            ink.y,
            pixmap.width() - ink.x - ink.width,
            pixmap.height() - ink.y - ink.height,
        )
    }

    #[test]
    fn render__should_pad_svg_ink_on_every_side() {
        // Given
        let renderer = RasterRenderer::new(BoxTypesetter::default());
        let style = RenderStyle {
            padding_px: 3,
            ..style()
        };

        // When
        let image = renderer.render("x", "svg", &style).expect("render");

        // Then
        assert_eq!(svg_margins(&image.bytes), (3, 3, 3, 3));
    }

    #[test]
    fn render__should_crop_real_glyph_svg_to_padding() {
        // Given
        let renderer = RasterRenderer::new(MathmlTypesetter);
        let formulas = [
            "y=ax+b",
            "x+1",
            r"\frac{dy}{dx}=\frac{dy}{du}\frac{du}{dx}",
        ];

        for formula in formulas {
            // When
            let image = renderer.render(formula, "svg", &style()).expect("render");

            // Then
            assert_eq!(svg_margins(&image.bytes), (2, 2, 2, 2), "formula {formula}");
        }
    }

    #[test]
    fn catalog__should_render_every_raster_token() {
        // Given
        let renderer = RasterRenderer::new(MathmlTypesetter);
        let tokens = CATEGORIES
            .iter()
            .flat_map(|category| category.tokens)
            .filter(|token| !needs_advanced(token.tex))
            .map(|token| token.tex);

        for tex in tokens.chain([DEFAULT_FORMULA]) {
            // When
            let result = renderer.render(tex, "svg", &style());

            // Then
            assert!(result.is_ok(), "{tex}: {:?}", result.err());
        }
    }

    #[test]
    fn check_canvas__should_cap_total_pixels() {
        assert!(check_canvas(8_192, 8_192).is_ok());
        assert!(matches!(
            check_canvas(10_000, 10_000),
            Err(RenderError::TooLarge {
                width: 10_000,
                height: 10_000,
                ..
            })
        ));
        assert!(check_canvas(MAX_CANVAS_PX + 1, 1).is_err());
    }

    #[test]
    fn render__should_strip_formula_delimiters() {
        // Given
        let typesetter = BoxTypesetter::default();
        let renderer = RasterRenderer::new(typesetter.clone());

        // When
        renderer.render("$x^2$", "svg", &style()).expect("wrapped");
        renderer.render("  x^2 ", "svg", &style()).expect("bare");

        // Then
        assert_eq!(typesetter.calls(), vec!["x^2".to_string(), "x^2".to_string()]);
    }

    #[test]
    fn render__should_reject_empty_math() {
        let renderer = RasterRenderer::new(BoxTypesetter::default());

        assert!(matches!(
            renderer.render("$$", "png", &style()),
            Err(RenderError::EmptyFormula)
        ));
    }

    #[test]
    fn render__should_reject_oversized_canvas() {
        // Given
        let renderer = RasterRenderer::new(BoxTypesetter {
            width_em: 20.0,
            ..BoxTypesetter::default()
        });
        let style = RenderStyle {
            font_size: 160,
            dpi: 600,
            ..style()
        };

        // When
        let result = renderer.render("x", "png", &style);

        // Then
        assert!(matches!(result, Err(RenderError::TooLarge { .. })));
    }

    #[test]
    fn render__should_report_blank_output() {
        let renderer = RasterRenderer::new(BlankTypesetter);

        assert!(matches!(
            renderer.render("x", "png", &style()),
            Err(RenderError::Blank)
        ));
    }

    #[test]
    fn math_content__should_peel_delimiters() {
        assert_eq!(math_content(" $a+b$ "), "a+b");
        assert_eq!(math_content("a+b"), "a+b");
        assert_eq!(math_content("$$ $$"), "");
    }
}

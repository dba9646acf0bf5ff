//! Advanced preview: the formula is handed to MathJax in the browser, which
//! draws it and offers its own SVG/PNG downloads and clipboard copy.

use crate::math::{MathStyle, render_mathml};
use crate::style::RenderStyle;
use crate::templates::MathJaxTemplate;

use askama::Template;

/// Builds the embedded component for `tex`. The text reaches the browser
/// unmodified.
pub(crate) fn component(tex: &str, style: &RenderStyle) -> MathJaxTemplate {
    MathJaxTemplate {
        tex: tex.to_string(),
        font_size_px: style.font_size,
        text_color: style.text_color.to_string(),
        background: style.background_css(),
        fallback_html: render_mathml(tex, MathStyle::Display).into_html(),
    }
}

/// Renders the component to an HTML fragment for the preview pane.
pub(crate) fn render_component(tex: &str, style: &RenderStyle) -> askama::Result<String> {
    component(tex, style).render()
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::style::Color;

    #[test]
    fn component__should_carry_style_to_the_browser() {
        // Given
        let style = RenderStyle {
            font_size: 40,
            text_color: Color { r: 0x12, g: 0x34, b: 0x56 },
            transparent: true,
            ..RenderStyle::default()
        };

        // When
        let component = component(r"\begin{cases} x \\ y \end{cases}", &style);

        // Then
        assert_eq!(component.tex, r"\begin{cases} x \\ y \end{cases}");
        assert_eq!(component.font_size_px, 40);
        assert_eq!(component.text_color, "#123456");
        assert_eq!(component.background, "transparent");
    }

    #[test]
    fn render_component__should_include_mathml_fallback() {
        // When
        let html = render_component("x^2", &RenderStyle::default()).expect("render");

        // Then
        assert!(html.contains("<noscript><math"));
        assert!(html.contains(r##"const BACKGROUND = "#ffffff";"##));
    }
}

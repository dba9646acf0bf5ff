//! Render style parameters shared by both render paths.

use crate::error::StyleError;

use serde::Deserialize;

use std::fmt;
use std::str::FromStr;

pub const FONT_SIZE_RANGE: (u32, u32) = (12, 160);
pub const DPI_RANGE: (u32, u32) = (72, 600);
pub const PADDING_RANGE: (u32, u32) = (0, 16);

pub const DEFAULT_FONT_SIZE: u32 = 56;
pub const DEFAULT_DPI: u32 = 300;
pub const DEFAULT_PADDING: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Svg,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = StyleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            other => Err(StyleError::InvalidFormat(other.to_string())),
        }
    }
}

/// An opaque sRGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color {
        r: 0xff,
        g: 0xff,
        b: 0xff,
    };
}

impl FromStr for Color {
    type Err = StyleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || StyleError::InvalidColor(raw.to_string());
        let hex = raw.trim().strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl TryFrom<String> for Color {
    type Error = StyleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Style applied to a render. Output format travels separately because the
/// raster adapter validates it on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    pub font_size: u32,
    pub dpi: u32,
    pub padding_px: u32,
    pub text_color: Color,
    pub background: Color,
    pub transparent: bool,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            dpi: DEFAULT_DPI,
            padding_px: DEFAULT_PADDING,
            text_color: Color::BLACK,
            background: Color::WHITE,
            transparent: false,
        }
    }
}

impl RenderStyle {
    /// Background as seen by the browser: `transparent` or the fill color.
    pub fn background_css(&self) -> String {
        if self.transparent {
            "transparent".to_string()
        } else {
            self.background.to_string()
        }
    }

    pub fn validate(&self) -> Result<(), StyleError> {
        check_range("font size", FONT_SIZE_RANGE, self.font_size)?;
        check_range("dpi", DPI_RANGE, self.dpi)?;
        check_range("padding", PADDING_RANGE, self.padding_px)?;
        Ok(())
    }

    /// Applies a user update. The background color is only taken while the
    /// background is opaque; a transparent update keeps the previous color.
    pub fn apply(&mut self, update: &StyleUpdate) -> Result<(), StyleError> {
        let mut next = self.clone();
        next.font_size = update.font_size;
        next.dpi = update.dpi;
        next.padding_px = update.padding_px;
        next.text_color = update.text_color.parse()?;
        next.transparent = update.transparent;
        if !update.transparent
            && let Some(background) = update.background.as_deref()
        {
            next.background = background.parse()?;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Raw style values as submitted by the settings form.
#[derive(Debug, Clone)]
pub struct StyleUpdate {
    pub font_size: u32,
    pub dpi: u32,
    pub padding_px: u32,
    pub text_color: String,
    pub background: Option<String>,
    pub transparent: bool,
}

fn check_range(name: &'static str, (min, max): (u32, u32), value: u32) -> Result<(), StyleError> {
    if value < min || value > max {
        return Err(StyleError::OutOfRange {
            name,
            min,
            max,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn update() -> StyleUpdate {
        StyleUpdate {
            font_size: 80,
            dpi: 144,
            padding_px: 4,
            text_color: "#336699".to_string(),
            background: Some("#fafafa".to_string()),
            transparent: false,
        }
    }

    #[test]
    fn color_parse__should_accept_hex_in_any_case() {
        assert_eq!(
            "#FF8000".parse::<Color>(),
            Ok(Color {
                r: 0xff,
                g: 0x80,
                b: 0
            })
        );
        assert_eq!("#ff8000".parse::<Color>(), "#FF8000".parse::<Color>());
    }

    #[test]
    fn color_parse__should_reject_malformed_values() {
        assert!("ff8000".parse::<Color>().is_err());
        assert!("#ff80".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
        assert!("".parse::<Color>().is_err());
    }

    #[test]
    fn color_display__should_round_trip_lowercase() {
        let color: Color = "#A0B1C2".parse().expect("color");
        assert_eq!(color.to_string(), "#a0b1c2");
    }

    #[test]
    fn output_format__should_parse_supported_values() {
        assert_eq!("png".parse::<OutputFormat>(), Ok(OutputFormat::Png));
        assert_eq!("svg".parse::<OutputFormat>(), Ok(OutputFormat::Svg));
        assert_eq!(
            "gif".parse::<OutputFormat>(),
            Err(StyleError::InvalidFormat("gif".to_string()))
        );
    }

    #[test]
    fn render_style_default__should_match_documented_defaults() {
        let style = RenderStyle::default();
        assert_eq!(style.font_size, 56);
        assert_eq!(style.dpi, 300);
        assert_eq!(style.padding_px, 2);
        assert_eq!(style.text_color, Color::BLACK);
        assert_eq!(style.background, Color::WHITE);
        assert!(!style.transparent);
        assert!(style.validate().is_ok());
    }

    #[test]
    fn render_style_apply__should_update_all_fields() {
        // Given
        let mut style = RenderStyle::default();

        // When
        style.apply(&update()).expect("apply");

        // Then
        assert_eq!(style.font_size, 80);
        assert_eq!(style.dpi, 144);
        assert_eq!(style.padding_px, 4);
        assert_eq!(style.text_color.to_string(), "#336699");
        assert_eq!(style.background.to_string(), "#fafafa");
    }

    #[test]
    fn render_style_apply__should_keep_background_when_transparent() {
        // Given
        let mut style = RenderStyle::default();
        let mut update = update();
        update.transparent = true;
        update.background = Some("#000000".to_string());

        // When
        style.apply(&update).expect("apply");

        // Then
        assert!(style.transparent);
        assert_eq!(style.background, Color::WHITE);
        assert_eq!(style.background_css(), "transparent");
    }

    #[test]
    fn render_style_apply__should_reject_out_of_range_without_mutating() {
        // Given
        let mut style = RenderStyle::default();
        let mut update = update();
        update.dpi = 900;

        // When
        let result = style.apply(&update);

        // Then
        assert_eq!(
            result,
            Err(StyleError::OutOfRange {
                name: "dpi",
                min: 72,
                max: 600,
                value: 900
            })
        );
        assert_eq!(style, RenderStyle::default());
    }

    #[test]
    fn render_style_apply__should_reject_bad_colors() {
        let mut style = RenderStyle::default();
        let mut update = update();
        update.text_color = "red".to_string();

        assert!(matches!(
            style.apply(&update),
            Err(StyleError::InvalidColor(_))
        ));
    }
}

use crate::editor::DEFAULT_FORMULA;
use crate::error::ConfigError;
use crate::style::{Color, OutputFormat, RenderStyle};

use serde::Deserialize;
use time::Duration;

use std::path::Path;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    /// Idle time after which a session is dropped.
    pub session_ttl: Duration,
    /// Formula new sessions start with.
    pub initial_formula: String,
    /// Style new sessions start with.
    pub style: RenderStyle,
    pub format: OutputFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "latexpad".to_string(),
            session_ttl: default_session_ttl(),
            initial_formula: DEFAULT_FORMULA.to_string(),
            style: RenderStyle::default(),
            format: OutputFormat::default(),
        }
    }
}

pub fn default_session_ttl() -> Duration {
    Duration::hours(12)
}

/// Optional TOML file overriding the defaults of new sessions.
///
/// ```toml
/// initial_formula = 'e^{i\pi}+1=0'
/// format = "svg"
///
/// [style]
/// font_size = 48
/// text_color = "#1f2937"
/// transparent = true
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    initial_formula: Option<String>,
    format: Option<String>,
    #[serde(default)]
    style: StyleSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StyleSection {
    font_size: Option<u32>,
    dpi: Option<u32>,
    padding_px: Option<u32>,
    text_color: Option<Color>,
    background: Option<Color>,
    transparent: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Overlays the file values onto `config`. Nothing is changed when any
    /// value is invalid.
    pub fn apply_to(self, config: &mut AppConfig) -> Result<(), ConfigError> {
        let mut style = config.style.clone();
        let section = self.style;
        if let Some(font_size) = section.font_size {
            style.font_size = font_size;
        }
        if let Some(dpi) = section.dpi {
            style.dpi = dpi;
        }
        if let Some(padding_px) = section.padding_px {
            style.padding_px = padding_px;
        }
        if let Some(text_color) = section.text_color {
            style.text_color = text_color;
        }
        if let Some(background) = section.background {
            style.background = background;
        }
        if let Some(transparent) = section.transparent {
            style.transparent = transparent;
        }
        style.validate()?;

        let format = match self.format.as_deref() {
            Some(raw) => raw.parse()?,
            None => config.format,
        };

        config.style = style;
        config.format = format;
        if let Some(formula) = self.initial_formula {
            config.initial_formula = formula;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::error::StyleError;

    #[test]
    fn parse__should_accept_empty_file() {
        // When
        let mut config = AppConfig::default();
        FileConfig::parse("")
            .expect("parse")
            .apply_to(&mut config)
            .expect("apply");

        // Then
        assert_eq!(config.style, RenderStyle::default());
        assert_eq!(config.initial_formula, DEFAULT_FORMULA);
        assert_eq!(config.format, OutputFormat::Png);
    }

    #[test]
    fn apply_to__should_override_style_and_formula() {
        // Given
        let raw = r##"
initial_formula = 'e^{i\pi}+1=0'
format = "svg"

[style]
font_size = 48
padding_px = 6
text_color = "#1F2937"
transparent = true
"##;

        // When
        let mut config = AppConfig::default();
        FileConfig::parse(raw)
            .expect("parse")
            .apply_to(&mut config)
            .expect("apply");

        // Then
        assert_eq!(config.initial_formula, r"e^{i\pi}+1=0");
        assert_eq!(config.format, OutputFormat::Svg);
        assert_eq!(config.style.font_size, 48);
        assert_eq!(config.style.padding_px, 6);
        assert_eq!(config.style.dpi, RenderStyle::default().dpi);
        assert_eq!(config.style.text_color.to_string(), "#1f2937");
        assert!(config.style.transparent);
    }

    #[test]
    fn apply_to__should_reject_out_of_range_values_without_changes() {
        // Given
        let file = FileConfig::parse("[style]\ndpi = 20\n").expect("parse");
        let mut config = AppConfig::default();

        // When
        let result = file.apply_to(&mut config);

        // Then
        assert!(matches!(
            result,
            Err(ConfigError::Style(StyleError::OutOfRange { name: "dpi", .. }))
        ));
        assert_eq!(config.style, RenderStyle::default());
    }

    #[test]
    fn apply_to__should_reject_unknown_format() {
        let file = FileConfig::parse("format = \"gif\"\n").expect("parse");

        let result = file.apply_to(&mut AppConfig::default());

        assert!(matches!(
            result,
            Err(ConfigError::Style(StyleError::InvalidFormat(_)))
        ));
    }

    #[test]
    fn parse__should_reject_bad_colors_and_unknown_keys() {
        assert!(matches!(
            FileConfig::parse("[style]\ntext_color = \"red\"\n"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            FileConfig::parse("theme = \"dark\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }
}

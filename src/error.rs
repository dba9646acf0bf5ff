use thiserror::Error;

/// Failures of the raster render path.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unsupported output format '{0}'; expected png or svg")]
    InvalidFormat(String),

    #[error("formula is empty")]
    EmptyFormula,

    #[error("typesetting failed: {0}")]
    Typeset(#[from] TypesetError),

    #[error("generated svg was rejected: {0}")]
    Svg(String),

    #[error("failed to allocate a {width}x{height} canvas")]
    Rasterize { width: u32, height: u32 },

    #[error("rendered image contains no visible glyphs")]
    Blank,

    #[error(
        "rendered image would be {width}x{height} px, above the limit of {max_side} px per side or {max_pixels} px in total"
    )]
    TooLarge {
        width: u32,
        height: u32,
        max_side: u32,
        max_pixels: u64,
    },

    #[error("failed to encode png: {0}")]
    Encode(String),
}

/// Failures of the layout engine behind the raster path.
#[derive(Debug, Error)]
pub enum TypesetError {
    #[error("cannot parse formula: {0}")]
    Parse(String),

    #[error("malformed math markup: {0}")]
    Markup(String),

    #[error("`{0}` cannot be laid out by the raster engine")]
    Unsupported(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StyleError {
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        min: u32,
        max: u32,
        value: u32,
    },

    #[error("invalid color '{0}'; expected #RRGGBB")]
    InvalidColor(String),

    #[error("unsupported output format '{0}'; expected png or svg")]
    InvalidFormat(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid style in config: {0}")]
    Style(#[from] StyleError),
}

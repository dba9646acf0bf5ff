//! Copy and download actions for the last raster image.

use crate::raster::RenderedImage;

use base64::{STANDARD, encode_config};

/// Export controls bound to one rendered image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportCta {
    /// `data:` URL the copy button fetches into the clipboard.
    pub data_url: String,
    pub mime_type: &'static str,
    pub filename: &'static str,
    pub download_url: String,
}

impl ExportCta {
    pub fn from_image(image: &RenderedImage) -> Self {
        let mime_type = image.mime_type();
        let filename = image.filename();
        Self {
            data_url: format!(
                "data:{mime_type};base64,{}",
                encode_config(&image.bytes, STANDARD)
            ),
            mime_type,
            filename,
            download_url: format!("/export/{filename}"),
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::style::OutputFormat;

    #[test]
    fn from_image__should_bind_png_bytes() {
        // Given
        let image = RenderedImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            format: OutputFormat::Png,
        };

        // When
        let cta = ExportCta::from_image(&image);

        // Then
        assert_eq!(cta.data_url, "data:image/png;base64,iVBORw==");
        assert_eq!(cta.mime_type, "image/png");
        assert_eq!(cta.filename, "latex.png");
        assert_eq!(cta.download_url, "/export/latex.png");
    }

    #[test]
    fn from_image__should_name_svg_downloads() {
        let image = RenderedImage {
            bytes: b"<svg/>".to_vec(),
            format: OutputFormat::Svg,
        };

        let cta = ExportCta::from_image(&image);

        assert_eq!(cta.filename, "latex.svg");
        assert!(cta.data_url.starts_with("data:image/svg+xml;base64,"));
    }
}

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::raster::{self, OutputFormat};

#[derive(Debug, Serialize)]
pub struct ConvertSummary {
    pub output_path: String,
    pub content_type: &'static str,
    pub size: usize,
}

impl fmt::Display for ConvertSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wrote {} ({} bytes) to {}",
            self.content_type, self.size, self.output_path
        )
    }
}

pub fn run(input: &Path, format: &str, output: &Path) -> Result<ConvertSummary> {
    let target: OutputFormat = format.parse()?;
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read image: {}", input.display()))?;

    let converted = raster::convert(&bytes, target)?;
    std::fs::write(output, &converted.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(ConvertSummary {
        output_path: output.display().to_string(),
        content_type: converted.format.mime_type(),
        size: converted.bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::test_support::sample_png;

    #[test]
    fn test_convert_png_to_webp() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.webp");
        std::fs::write(&input, sample_png(12, 12)).unwrap();

        let summary = run(&input, "WebP", &output).unwrap();
        assert_eq!(summary.content_type, "image/webp");
        assert_eq!(
            image::ImageFormat::from_path(&output).unwrap(),
            image::ImageFormat::WebP
        );
        assert_eq!(image::open(&output).unwrap().width(), 12);
    }

    #[test]
    fn test_unknown_format() {
        let err = run(Path::new("in.png"), "bmp", Path::new("out.bmp")).unwrap_err();
        assert!(err.to_string().starts_with("Invalid format"));
    }
}

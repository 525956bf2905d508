use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::pdf;

#[derive(Debug, Serialize)]
pub struct ImagesToPdfSummary {
    pub output_path: String,
    pub page_count: usize,
}

impl fmt::Display for ImagesToPdfSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wrote {} pages to {}", self.page_count, self.output_path)
    }
}

pub fn run(inputs: &[PathBuf], output: &Path) -> Result<ImagesToPdfSummary> {
    if inputs.is_empty() {
        bail!("No input images specified");
    }

    let contents = inputs
        .iter()
        .map(|path| {
            std::fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let images: Vec<&[u8]> = contents.iter().map(Vec::as_slice).collect();

    let mut doc = pdf::images_to_pdf(&images)?;
    doc.save(output)
        .with_context(|| format!("Failed to save PDF: {}", output.display()))?;

    Ok(ImagesToPdfSummary {
        output_path: output.display().to_string(),
        page_count: doc.page_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfDocument;
    use crate::raster::test_support::{sample_jpeg, sample_png};

    #[test]
    fn test_one_page_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("a.png");
        let jpg = dir.path().join("b.jpg");
        std::fs::write(&png, sample_png(30, 20)).unwrap();
        std::fs::write(&jpg, sample_jpeg(20, 30)).unwrap();

        let output = dir.path().join("out.pdf");
        let summary = run(&[png, jpg], &output).unwrap();
        assert_eq!(summary.page_count, 2);
        assert_eq!(PdfDocument::open(&output).unwrap().page_count(), 2);
    }
}

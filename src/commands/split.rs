use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::page_range::select_pages;
use crate::pdf::PdfDocument;

#[derive(Debug, Serialize)]
pub struct SplitSummary {
    pub output_path: String,
    pub page_count: usize,
}

impl fmt::Display for SplitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wrote {} pages to {}", self.page_count, self.output_path)
    }
}

/// Copy the pages selected by `pages` (e.g. "1-3, 7") into a new PDF.
pub fn run(input: &Path, pages: &str, output: &Path) -> Result<SplitSummary> {
    let source = PdfDocument::open(input)
        .with_context(|| format!("Failed to open PDF: {}", input.display()))?;
    let total = source.page_count();

    let indices = select_pages(pages, total);
    if indices.is_empty() {
        bail!("No valid pages in \"{}\" (document has {} pages)", pages, total);
    }

    let mut doc = source.extract_pages(&indices)?;
    doc.save(output)
        .with_context(|| format!("Failed to save PDF: {}", output.display()))?;

    Ok(SplitSummary {
        output_path: output.display().to_string(),
        page_count: indices.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::{page_labels, sample_pdf};

    #[test]
    fn test_split_writes_selected_pages() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, sample_pdf(6)).unwrap();

        let summary = run(&input, "5-6,2", &output).unwrap();
        assert_eq!(summary.page_count, 3);

        let written = PdfDocument::open(&output).unwrap();
        assert_eq!(page_labels(&written), ["Page 2", "Page 5", "Page 6"]);
    }

    #[test]
    fn test_split_without_valid_pages_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, sample_pdf(2)).unwrap();

        let err = run(&input, "7-9", &dir.path().join("out.pdf")).unwrap_err();
        assert!(err.to_string().contains("No valid pages"));
        assert!(!dir.path().join("out.pdf").exists());
    }
}

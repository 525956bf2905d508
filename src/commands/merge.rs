use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::pdf;

#[derive(Debug, Serialize)]
pub struct MergeSummary {
    pub output_path: String,
    pub file_count: usize,
    pub page_count: usize,
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Merged {} files ({} pages) into {}",
            self.file_count, self.page_count, self.output_path
        )
    }
}

pub fn run(inputs: &[PathBuf], output: &Path) -> Result<MergeSummary> {
    if inputs.len() < 2 {
        bail!("At least 2 PDF files are required");
    }

    let contents = inputs
        .iter()
        .map(|path| {
            std::fs::read(path).with_context(|| format!("Failed to read PDF: {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let sources: Vec<&[u8]> = contents.iter().map(Vec::as_slice).collect();

    let mut merged = pdf::merge(&sources)?;
    merged
        .save(output)
        .with_context(|| format!("Failed to save merged PDF: {}", output.display()))?;

    Ok(MergeSummary {
        output_path: output.display().to_string(),
        file_count: inputs.len(),
        page_count: merged.page_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::sample_pdf;
    use crate::pdf::PdfDocument;

    #[test]
    fn test_merge_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, sample_pdf(2)).unwrap();
        std::fs::write(&b, sample_pdf(4)).unwrap();

        let output = dir.path().join("merged.pdf");
        let summary = run(&[a, b], &output).unwrap();
        assert_eq!(summary.file_count, 2);
        assert_eq!(summary.page_count, 6);
        assert_eq!(PdfDocument::open(&output).unwrap().page_count(), 6);
    }

    #[test]
    fn test_merge_needs_two_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        std::fs::write(&a, sample_pdf(1)).unwrap();
        assert!(run(&[a], &dir.path().join("merged.pdf")).is_err());
    }
}

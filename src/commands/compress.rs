use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::pdf;

#[derive(Debug, Serialize)]
pub struct CompressSummary {
    pub output_path: String,
    pub original_size: usize,
    pub compressed_size: usize,
}

impl fmt::Display for CompressSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Compressed {} -> {} bytes into {}",
            self.original_size, self.compressed_size, self.output_path
        )
    }
}

pub fn run(input: &Path, output: &Path) -> Result<CompressSummary> {
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read PDF: {}", input.display()))?;
    let result = pdf::compress(&bytes)?;
    std::fs::write(output, &result.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(CompressSummary {
        output_path: output.display().to_string(),
        original_size: result.original_size,
        compressed_size: result.compressed_size,
    })
}

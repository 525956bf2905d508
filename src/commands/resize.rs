use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::raster;

#[derive(Debug, Serialize)]
pub struct ResizeSummary {
    pub output_path: String,
    pub width: u32,
    pub height: u32,
    pub size: usize,
}

impl fmt::Display for ResizeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Resized to {}x{} ({} bytes) into {}",
            self.width, self.height, self.size, self.output_path
        )
    }
}

/// Resize to exactly `width` x `height` and write a PNG.
pub fn run(input: &Path, width: u32, height: u32, output: &Path) -> Result<ResizeSummary> {
    raster::validate_dimensions(width, height)?;
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read image: {}", input.display()))?;

    let resized = raster::resize(&bytes, width, height)?;
    std::fs::write(output, &resized.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(ResizeSummary {
        output_path: output.display().to_string(),
        width,
        height,
        size: resized.bytes.len(),
    })
}

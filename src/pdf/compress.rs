use tracing::{debug, instrument};

use crate::error::Result;
use crate::pdf::PdfDocument;

#[derive(Debug, Clone)]
pub struct CompressedPdf {
    pub bytes: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
}

/// Shrink a PDF without touching page content: drop descriptive metadata,
/// unreferenced objects and empty streams, then deflate uncompressed streams.
#[instrument(skip_all, fields(original_size = bytes.len()))]
pub fn compress(bytes: &[u8]) -> Result<CompressedPdf> {
    let mut pdf = PdfDocument::load(bytes)?;

    pdf.strip_metadata();
    let pruned = pdf.doc.prune_objects().len();
    let empty = pdf.doc.delete_zero_length_streams().len();
    pdf.doc.compress();

    let output = pdf.to_bytes()?;
    debug!(pruned, empty, compressed_size = output.len(), "PDF compressed");

    Ok(CompressedPdf {
        original_size: bytes.len(),
        compressed_size: output.len(),
        bytes: output,
    })
}

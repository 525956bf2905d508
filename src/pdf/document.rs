use lopdf::{Document, Object, ObjectId};
use std::path::Path;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Info dictionary entries cleared by [`PdfDocument::strip_metadata`].
const METADATA_KEYS: [&[u8]; 6] = [
    b"Title",
    b"Author",
    b"Subject",
    b"Keywords",
    b"Producer",
    b"Creator",
];

pub struct PdfDocument {
    pub doc: Document,
}

impl PdfDocument {
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| Error::InvalidPdf {
            reason: e.to_string(),
        })?;
        debug!(pages = doc.get_pages().len(), "PDF loaded");
        Ok(PdfDocument { doc })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::load(&bytes)
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Keep only the pages at the given zero-based indices.
    ///
    /// Indices must be ascending; the page tree is left in document order.
    #[instrument(skip(self), fields(total = self.page_count()))]
    pub fn extract_pages(&self, indices: &[usize]) -> Result<PdfDocument> {
        let total = self.page_count();

        if let Some(&bad) = indices.iter().find(|&&i| i >= total) {
            return Err(Error::Processing {
                reason: format!("Page {} is out of range (1-{})", bad + 1, total),
            });
        }

        // lopdf numbers pages from 1
        let pages_to_delete: Vec<u32> = (1..=total as u32)
            .filter(|num| indices.binary_search(&(*num as usize - 1)).is_err())
            .collect();

        let mut new_doc = self.doc.clone();
        if !pages_to_delete.is_empty() {
            new_doc.delete_pages(&pages_to_delete);
            new_doc.prune_objects();
        }

        Ok(PdfDocument { doc: new_doc })
    }

    /// Clear the descriptive Info dictionary entries.
    pub fn strip_metadata(&mut self) {
        let info_id = match self.doc.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };

        // Info is usually indirect but may be inlined in the trailer
        let info = match info_id {
            Some(id) => self.doc.get_dictionary_mut(id).ok(),
            None => self
                .doc
                .trailer
                .get_mut(b"Info")
                .and_then(Object::as_dict_mut)
                .ok(),
        };

        if let Some(dict) = info {
            for key in METADATA_KEYS {
                dict.remove(key);
            }
        }
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer).map_err(|e| Error::Processing {
            reason: format!("Failed to serialize PDF: {}", e),
        })?;
        Ok(buffer)
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Object id of the root of the page tree.
    pub fn pages_root(&self) -> Result<ObjectId> {
        self.doc
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|e| Error::InvalidPdf {
                reason: format!("Missing page tree: {}", e),
            })
    }
}

use lopdf::{dictionary, Document, Object};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::pdf::PdfDocument;

/// Concatenate every page of each input, in input order.
///
/// Objects of each source are renumbered into a shared id space. Each source's
/// page tree root becomes a child of a new root, so attributes that pages
/// inherit from their tree (MediaBox, Resources, Rotate) stay intact.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn merge(inputs: &[&[u8]]) -> Result<PdfDocument> {
    let mut merged = Document::with_version("1.5");
    let mut next_id = 1;
    let mut subtrees = Vec::with_capacity(inputs.len());
    let mut total_pages = 0i64;

    for (index, bytes) in inputs.iter().enumerate() {
        let mut source = Document::load_mem(bytes).map_err(|e| Error::InvalidPdf {
            reason: format!("input #{}: {}", index + 1, e),
        })?;
        source.renumber_objects_with(next_id);
        next_id = source.max_id + 1;

        let source = PdfDocument { doc: source };
        let root = source.pages_root()?;
        total_pages += source.page_count() as i64;
        subtrees.push(root);

        // The source catalog and trailer are dropped; anything reachable only
        // from them is pruned below.
        merged.objects.extend(source.doc.objects);
    }

    merged.max_id = next_id.saturating_sub(1);
    let pages_id = merged.new_object_id();

    for &subtree in &subtrees {
        let node = merged.get_dictionary_mut(subtree).map_err(|e| Error::InvalidPdf {
            reason: format!("Broken page tree: {}", e),
        })?;
        node.set("Parent", pages_id);
    }

    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => subtrees.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
            "Count" => total_pages,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.prune_objects();

    debug!(pages = total_pages, "Merge complete");
    Ok(PdfDocument { doc: merged })
}

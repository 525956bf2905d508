mod compress;
mod document;
mod images;
mod merge;

pub use compress::compress;
pub use document::PdfDocument;
pub use images::images_to_pdf;
pub use merge::merge;

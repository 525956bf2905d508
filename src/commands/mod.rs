pub mod compress;
pub mod convert;
pub mod images_to_pdf;
pub mod merge;
pub mod resize;
pub mod split;

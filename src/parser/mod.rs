pub mod document;
pub mod images;

pub use images::{extract_images, ExtractOptions, Extraction};

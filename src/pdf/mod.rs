//! PDF manipulation module

pub mod font;
pub mod page;
pub mod merge;
pub mod metadata;

// Re-export commonly used items
pub use merge::{merge_pdfs, MergeOptions};
pub use metadata::{count_pages, extract_metadata, PdfMetadata};

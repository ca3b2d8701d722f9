//! PDF merging functionality using lopdf

use std::collections::BTreeMap;
use std::path::PathBuf;
use chrono::Local;
use lopdf::{Document, Object, ObjectId, Dictionary, StringFormat};
use tracing::debug;
use crate::error::{Error, Result};

/// Producer recorded in merged documents
pub const PRODUCER: &str = concat!("qr-cards ", env!("CARGO_PKG_VERSION"));

/// Options for merging PDFs
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Input PDF file paths in the order they should be merged
    pub input_paths: Vec<PathBuf>,
    /// Output PDF file path
    pub output_path: PathBuf,
    /// Document title for the Info dictionary
    pub title: Option<String>,
}

/// Merge multiple PDF files into a single PDF
///
/// Based on the lopdf merge example:
/// https://github.com/J-F-Liu/lopdf/blob/main/examples/merge.rs
///
/// Pages keep their input order. Each page must carry its own MediaBox
/// and Resources; nothing is inherited from the source page trees.
///
/// # Example
///
/// ```no_run
/// use qr_cards::pdf::{MergeOptions, merge_pdfs};
/// use std::path::PathBuf;
///
/// let options = MergeOptions {
///     input_paths: vec![
///         PathBuf::from("tarjetas_qr_pagina_1.pdf"),
///         PathBuf::from("tarjetas_qr_pagina_2.pdf"),
///     ],
///     output_path: PathBuf::from("merged.pdf"),
///     title: None,
/// };
///
/// merge_pdfs(&options).expect("Failed to merge");
/// ```
pub fn merge_pdfs(options: &MergeOptions) -> Result<()> {
    if options.input_paths.is_empty() {
        return Err(Error::General("No input files provided".to_string()));
    }

    // Validate all input files exist
    for path in &options.input_paths {
        if !path.exists() {
            return Err(Error::FileNotFound(path.clone()));
        }
    }

    // Load all documents
    let mut documents: Vec<Document> = Vec::new();
    for path in &options.input_paths {
        let doc = Document::load(path)?;

        if doc.get_pages().is_empty() {
            return Err(Error::EmptyPdf(path.clone()));
        }

        documents.push(doc);
    }

    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        // Renumber objects in this document to avoid conflicts
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        page_ids.extend(doc.get_pages().into_values());
        objects.extend(doc.objects);
    }

    let mut merged_doc = Document::with_version("1.5");
    merged_doc.objects.extend(objects);

    // New object IDs must start above everything copied in
    merged_doc.max_id = max_id - 1;

    let pages_id = merged_doc.new_object_id();

    let kids: Vec<Object> = page_ids
        .iter()
        .map(|&id| Object::Reference(id))
        .collect();

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(page_ids.len() as i64));
    pages_object.set("Kids", Object::Array(kids));

    let catalog_id = merged_doc.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    merged_doc.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged_doc.objects.insert(pages_id, Object::Dictionary(pages_object));
    merged_doc.trailer.set("Root", Object::Reference(catalog_id));

    // The old catalogs and page tree roots are still in `objects` but
    // unreachable; point every page at the new root.
    for &page_id in &page_ids {
        if let Ok(Object::Dictionary(dict)) = merged_doc.get_object_mut(page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    let info_id = merged_doc.add_object(Object::Dictionary(info_dictionary(options.title.as_deref())));
    merged_doc.trailer.set("Info", Object::Reference(info_id));

    merged_doc.prune_objects();
    merged_doc.compress();
    merged_doc.save(&options.output_path)?;

    debug!("Merged {} pages into {}", page_ids.len(), options.output_path.display());
    Ok(())
}

/// Info dictionary with producer, creation date and optional title
fn info_dictionary(title: Option<&str>) -> Dictionary {
    let mut info = Dictionary::new();
    if let Some(title) = title {
        info.set("Title", Object::String(title.as_bytes().to_vec(), StringFormat::Literal));
    }
    info.set("Producer", Object::String(PRODUCER.as_bytes().to_vec(), StringFormat::Literal));

    let created = Local::now().format("D:%Y%m%d%H%M%S").to_string();
    info.set("CreationDate", Object::String(created.into_bytes(), StringFormat::Literal));
    info
}

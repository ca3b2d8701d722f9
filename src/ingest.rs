//! Product ID upload and persistence
//!
//! Uploads are `;`-delimited text files with a header row. The "Product ID"
//! column is extracted in file order and stored as a JSON array of strings,
//! replacing whatever list was stored before.

use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};
use crate::error::{Error, Result};

/// Header of the column holding product identifiers
pub const PRODUCT_ID_COLUMN: &str = "Product ID";

/// Extract product IDs from an uploaded file
///
/// `file_name` is the name the file was uploaded under; only `.csv` files
/// are accepted. IDs are neither validated nor deduplicated.
pub fn read_product_ids<R: Read>(reader: R, file_name: &str) -> Result<Vec<String>> {
    let is_csv = Path::new(file_name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return Err(Error::InvalidUpload(format!(
            "expected a .csv file, got \"{}\"",
            file_name
        )));
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(reader);

    let column = csv_reader
        .headers()?
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == PRODUCT_ID_COLUMN)
        .ok_or_else(|| Error::MissingColumn(PRODUCT_ID_COLUMN.to_string()))?;

    let mut ids = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record?;
        match record.get(column) {
            Some(id) => ids.push(id.trim().to_string()),
            // Header is line 1
            None => warn!("Row {} has no \"{}\" value, skipping", line + 2, PRODUCT_ID_COLUMN),
        }
    }

    debug!("Read {} product IDs from {}", ids.len(), file_name);
    Ok(ids)
}

/// Read an uploaded file from disk
pub fn read_product_ids_from_path(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = fs::File::open(path)?;
    read_product_ids(file, &file_name)
}

/// Persist the ID list, replacing the previous one
pub fn save_product_ids(path: &Path, ids: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string(ids)?)?;
    Ok(())
}

/// Load the stored ID list; a missing file is an empty list
pub fn load_product_ids(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        debug!("No stored ID list at {}", path.display());
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Load the stored ID list for a generation run
///
/// Fails with `NoProductIds` when the list is missing or empty, before any
/// catalog client is set up.
pub fn require_product_ids(path: &Path) -> Result<Vec<String>> {
    let ids = load_product_ids(path)?;
    if ids.is_empty() {
        return Err(Error::NoProductIds);
    }
    Ok(ids)
}

//! Error types for the QR cards library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the QR cards library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed ID upload
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Network or HTTP status error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Catalog response is not well-formed XML
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// PNG decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON (ID list or sidecar) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Uploaded file was rejected before parsing
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Upload header lacks the ID column
    #[error("Column \"{0}\" not found in upload header")]
    MissingColumn(String),

    /// Catalog response lacks a required element
    #[error("Product {id}: missing element {path}")]
    MissingField { id: String, path: &'static str },

    /// Nothing to generate
    #[error("No product IDs found")]
    NoProductIds,

    /// QR directory absent
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Configured font file absent
    #[error("Font file not found: {}", .0.display())]
    FontNotFound(PathBuf),

    /// Font error
    #[error("Font error: {0}")]
    Font(String),

    /// QR encoding error
    #[error("QR encoding error: {0}")]
    Qr(String),

    /// Configuration values that cannot produce a layout
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// General error
    #[error("{0}")]
    General(String),
}

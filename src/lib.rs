//! QR Cards Library
//!
//! Turns a list of catalog product IDs into printable QR code cards.
//! This library provides functionality to:
//! - Read product IDs from an uploaded CSV file
//! - Fetch product records (name, reference, taxed price) from the catalog API
//! - Shorten storefront URLs and emit one QR image per product
//! - Lay the QR images out as cards on A4 pages
//! - Render one PDF per page and merge them into a single document
//!
//! # Example
//!
//! ```no_run
//! use qr_cards::cards::{generate_cards, CardsOptions};
//! use qr_cards::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load config");
//! let output = generate_cards(&CardsOptions::from_config(&config))
//!     .expect("Failed to build cards");
//!
//! println!("{} pages", output.page_files.len());
//! ```

pub mod error;
pub mod config;
pub mod ingest;
pub mod catalog;
pub mod naming;
pub mod qr;
pub mod layout;
pub mod cards;
pub mod pdf;

// Re-export commonly used items
pub use error::{Error, Result};
